// End-to-end decode -> merge -> cache pipeline tests.
//
// Exercises the full path a published frame takes: multipart decoding with
// rate-limiting decimation, dual-range current merging driven by the digital
// validity bits, cache writes, and catch-up reads through the service loop.

use daq_telemetry::config::Settings;
use daq_telemetry::data::cache::DataCache;
use daq_telemetry::decoder::{self, DecoderConfig};
use daq_telemetry::service::TelemetryService;
use daq_telemetry::testing;

/// A frame shaped like a real acquisition block: two voltage channels, one
/// dual-range current pair with its hidden validity flag, one user digital
/// input, four samples.
fn acquisition_frame(epoch_seconds: i64) -> decoder::RawFrame {
    testing::frame_builder()
        .data_rate(1000)
        .epoch(epoch_seconds, 250_000_000)
        .voltage("V1", &[100_000_000, 200_000_000, 300_000_000, 400_000_000])
        .voltage("V2", &[-100_000_000, -200_000_000, -300_000_000, -400_000_000])
        .current("I1H", &[1_000_000_000, 2_000_000_000, 1_500_000_000, 500_000_000])
        .channel("I1L", "A", 1e-11, &[500, 600, 700, 800])
        .digital_bit("DI1", 0)
        .validity("I1L_valid", 6)
        // DI1 set on samples 0 and 2, I1L valid on samples 1 and 3
        .digital_masks(&[0b0000_0001, 0b0100_0000, 0b0000_0001, 0b0100_0000])
        .build()
}

#[test]
fn frame_decodes_merges_and_reads_back() {
    let settings = Settings::default();
    let message = decoder::decode_frame(&acquisition_frame(1_700_000_000), &settings.decoder_config())
        .unwrap();

    // timestamps reconstructed from the batch epoch at nominal spacing
    let epoch_ms = 1_700_000_000.0 * 1e3 + 250.0;
    assert_eq!(
        message.time,
        vec![epoch_ms, epoch_ms + 1.0, epoch_ms + 2.0, epoch_ms + 3.0]
    );

    // voltages scaled to physical units
    assert_eq!(message.data["V1"], vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(message.data["V2"], vec![-1.0, -2.0, -3.0, -4.0]);

    // dual-range current: low-range wins where bit 6 is set
    let i1 = &message.data["I1"];
    assert_eq!(i1[0], 1.0);
    assert!((i1[1] - 6e-9).abs() < 1e-15);
    assert_eq!(i1[2], 1.5);
    assert!((i1[3] - 8e-9).abs() < 1e-15);

    // raw range channels and the validity entry are gone
    assert!(!message.data.contains_key("I1H"));
    assert!(!message.data.contains_key("I1L"));
    assert!(!message.metadata.contains_key("I1L_valid"));
    assert!(message.metadata.contains_key("DI1"));

    // user digital bits pass through decimation verbatim
    assert_eq!(message.digital, vec![0b01, 0b0100_0000 & 0xff, 0b01, 0b0100_0000 & 0xff]);

    // and the cache serves it back
    let mut cache = DataCache::new(settings.cache_config());
    cache.write(&message);
    let reply = cache.read(epoch_ms + 1.5, 0);
    assert_eq!(reply.time.as_deref(), Some(&[epoch_ms + 2.0, epoch_ms + 3.0][..]));
    assert_eq!(reply.data["I1"].len(), 2);
    assert!(!reply.metadata.contains_key("I1L_valid"));
}

#[test]
fn high_rate_stream_is_decimated_to_web_rate() {
    let raw: Vec<i32> = (0..6400).map(|i| i * 1000).collect();
    let masks = vec![0u32; 6400];
    let frame = testing::frame_builder()
        .data_rate(64_000)
        .epoch(1_000, 0)
        .voltage("V1", &raw)
        .digital_masks(&masks)
        .build();

    let config = DecoderConfig {
        web_data_rate: 1000,
        merge_groups: vec![],
    };
    let message = decoder::decode_frame(&frame, &config).unwrap();

    assert_eq!(message.time.len(), 100);
    assert_eq!(message.data["V1"].len(), 100);
    assert_eq!(message.digital.len(), 100);

    // stride decimation keeps every 64th raw sample verbatim
    assert_eq!(message.data["V1"][0], 0.0);
    assert!((message.data["V1"][1] - 6.4e-4).abs() < 1e-9);
    // one millisecond of output spacing per sample
    assert_eq!(message.time[1] - message.time[0], 1.0);
}

#[tokio::test]
async fn service_round_trip_with_catch_up() {
    let (service, handle) = TelemetryService::new(&Settings::default());
    tokio::spawn(service.run());

    for i in 0..5i64 {
        handle
            .publish_frame(acquisition_frame(1_700_000_000 + i))
            .await
            .unwrap();
    }

    // a client that saw the second batch catches up on the rest
    let reference = 1_700_000_001.0 * 1e3 + 250.0 + 3.5;
    let reply = handle.read(reference, 0).await.unwrap();
    let time = reply.time.as_deref().unwrap_or_default();
    assert_eq!(time.len(), 12);
    assert_eq!(time[0], 1_700_000_002.0 * 1e3 + 250.0);

    // limit bounds the catch-up to the most recent samples
    let reply = handle.read(reference, 4).await.unwrap();
    assert_eq!(reply.time.as_deref().map(<[f64]>::len), Some(4));

    // nothing newer than the stream: a miss, not an error
    let reply = handle.read(1.0e15, 0).await.unwrap();
    assert!(reply.is_miss());
}
