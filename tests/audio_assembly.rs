use podgen::{AudioAssembler, AudioSegment, OutputFormat, PodgenError};
use std::io::Cursor;

fn sine_wav(sample_rate: u32, channels: u16, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = (sample_rate as f32 * seconds) as usize;
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = ((t * 440.0 * std::f32::consts::TAU).sin() * 8000.0) as i16;
        for _ in 0..channels {
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();
    cursor.into_inner()
}

fn read_back(data: &[u8]) -> (hound::WavSpec, Vec<i16>) {
    let reader = hound::WavReader::new(Cursor::new(data)).unwrap();
    let spec = reader.spec();
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    (spec, samples)
}

#[test]
fn mixed_rate_segments_concatenate_into_target_format() {
    let segments = vec![
        AudioSegment::new(0, sine_wav(16_000, 1, 1.0)).with_codec("wav"),
        AudioSegment::new(1, sine_wav(48_000, 2, 2.0)).with_codec("wav"),
    ];

    let audio = AudioAssembler::default().assemble(segments).unwrap();

    assert_eq!(audio.sample_rate, 44_100);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.segment_count, 2);
    let seconds = audio.duration().as_secs_f64();
    assert!((seconds - 3.0).abs() < 0.01, "duration was {seconds}");

    let (spec, samples) = read_back(&audio.data);
    assert_eq!(spec.sample_rate, 44_100);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(samples.len() as u64, audio.frames);
    assert_eq!(audio.mime_type(), "audio/wav");
}

#[test]
fn stereo_target_duplicates_mono_input() {
    let format = OutputFormat {
        sample_rate: 22_050,
        channels: 2,
    };
    let audio = AudioAssembler::new(format)
        .assemble(vec![AudioSegment::new(0, sine_wav(22_050, 1, 0.5))])
        .unwrap();

    let (spec, samples) = read_back(&audio.data);
    assert_eq!(spec.channels, 2);
    assert_eq!(samples.len(), 2 * 11_025);
    for frame in samples.chunks(2) {
        assert_eq!(frame[0], frame[1]);
    }
}

#[test]
fn single_segment_is_reencoded_not_copied() {
    let input = sine_wav(22_050, 1, 1.0);
    let audio = AudioAssembler::default()
        .assemble(vec![AudioSegment::new(0, input.clone())])
        .unwrap();

    assert_ne!(audio.data, input);
    let (spec, samples) = read_back(&audio.data);
    assert_eq!(spec.sample_rate, 44_100);
    let expected = 44_100_i64;
    assert!(
        (samples.len() as i64 - expected).abs() <= 2,
        "got {} frames",
        samples.len()
    );
}

#[test]
fn empty_input_is_rejected() {
    let err = AudioAssembler::default().assemble(Vec::new()).unwrap_err();
    assert!(matches!(err, PodgenError::EmptyInput));
    assert_eq!(err.code(), "empty_input");
}

#[test]
fn undecodable_segment_names_its_sequence() {
    let segments = vec![
        AudioSegment::new(0, sine_wav(16_000, 1, 0.1)),
        AudioSegment::new(1, b"definitely not audio".to_vec()).with_codec("mp3"),
        AudioSegment::new(2, sine_wav(16_000, 1, 0.1)),
    ];
    let err = AudioAssembler::default().assemble(segments).unwrap_err();
    assert!(
        matches!(err, PodgenError::UnsupportedFormat { sequence: 1, .. }),
        "{err}"
    );
}

#[test]
fn segment_order_is_input_order() {
    // A loud segment followed by a silent one: the loud half must come first.
    let loud = sine_wav(44_100, 1, 0.2);
    let silent = {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..8_820 {
            writer.write_sample(0_i16).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    };

    let audio = AudioAssembler::default()
        .assemble(vec![AudioSegment::new(0, loud), AudioSegment::new(1, silent)])
        .unwrap();
    let (_, samples) = read_back(&audio.data);
    let (first, second) = samples.split_at(8_820);
    assert!(first.iter().any(|s| s.abs() > 1_000));
    assert!(second.iter().all(|s| *s == 0));
}
