use aws_lambda_events::event::s3::S3Event;
use tempfile::{tempdir, TempDir};
use webfont_bucket_core::config::PipelineConfig;
use webfont_bucket_core::contract::{
    GeneratedFont, MockFontSynthesizer, MockObjectStore, ObjectSummary, SynthesisError,
};
use webfont_bucket_core::error::PipelineError;
use webfont_bucket_core::fs_store::FsObjectStore;
use webfont_bucket_core::pipeline::{Phase, Pipeline, RunOutcome};
use webfont_bucket_core::synthesize::{FontConfig, Stylesheet};
use webfont_bucket_core::trigger::{SkipReason, TriggerRecord};

struct Fixture {
    buckets: TempDir,
    scratch: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            buckets: tempdir().unwrap(),
            scratch: tempdir().unwrap(),
        }
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            scratch_root: self.scratch.path().join("runs"),
            ..PipelineConfig::default()
        }
    }

    fn put(&self, bucket: &str, key: &str, body: &str) {
        let path = self.buckets.path().join(bucket).join(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn read(&self, bucket: &str, key: &str) -> Option<String> {
        std::fs::read_to_string(self.buckets.path().join(bucket).join(key)).ok()
    }

    fn scratch_is_empty(&self) -> bool {
        let runs = self.scratch.path().join("runs");
        !runs.exists() || std::fs::read_dir(runs).unwrap().next().is_none()
    }
}

/// Stand-in for the font generator: writes every artifact the real one would and
/// numbers glyphs from `\f101` in file order.
fn write_artifacts(config: &FontConfig) -> Result<Box<dyn GeneratedFont>, SynthesisError> {
    let mut css = format!("@font-face {{\n    font-family: \"{}\";\n}}\n\n", config.font_name);
    for (i, file) in config.files.iter().enumerate() {
        let name = file.file_stem().unwrap().to_string_lossy();
        css.push_str(&format!(
            "{}-{}:before {{\n    content: \"\\f{:x}\";\n}}\n",
            config.base_selector,
            name,
            0x101 + i
        ));
    }
    let write = |ext: &str, body: &str| {
        std::fs::write(config.dest.join(format!("{}.{ext}", config.font_name)), body)
            .map_err(|e| SynthesisError::Other(e.to_string()))
    };
    for ext in ["eot", "woff2", "woff", "ttf", "svg", "html"] {
        write(ext, ext)?;
    }
    write("json", "{}")?;
    write("css", &css)?;
    let font: Box<dyn GeneratedFont> = Box::new(Stylesheet::new(css));
    Ok(font)
}

fn fake_generator() -> MockFontSynthesizer {
    let mut synth = MockFontSynthesizer::new();
    synth.expect_generate().times(1).returning(write_artifacts);
    synth
}

fn s3_event(bucket: &str, key: &str) -> S3Event {
    serde_json::from_value(serde_json::json!({
        "Records": [{
            "eventVersion": "2.0",
            "eventSource": "aws:s3",
            "awsRegion": "us-east-1",
            "eventTime": "1970-01-01T00:00:00.000Z",
            "eventName": "ObjectCreated:Put",
            "userIdentity": { "principalId": "EXAMPLE" },
            "requestParameters": { "sourceIPAddress": "127.0.0.1" },
            "responseElements": {
                "x-amz-request-id": "EXAMPLE123456789",
                "x-amz-id-2": "EXAMPLE123/5678abcdefghijklambdaisawesome/mnopqrstuvwxyzABCDEFGH"
            },
            "s3": {
                "s3SchemaVersion": "1.0",
                "configurationId": "testConfigRule",
                "bucket": {
                    "name": bucket,
                    "ownerIdentity": { "principalId": "EXAMPLE" },
                    "arn": format!("arn:aws:s3:::{bucket}")
                },
                "object": {
                    "key": key,
                    "size": 1024,
                    "eTag": "0123456789abcdef0123456789abcdef",
                    "sequencer": "0A1B2C3D4E5F678901"
                }
            }
        }]
    }))
    .expect("valid S3 event")
}

#[tokio::test]
async fn publishes_font_for_collection_end_to_end() {
    let fx = Fixture::new();
    fx.put("assets", "icons/set1/home.svg", "<svg id=\"home\"/>");
    fx.put("assets", "icons/set1/star.svg", "<svg id=\"star\"/>");
    fx.put("assets", "icons/set1/readme.txt", "not an icon");
    fx.put("assets", "icons/set10/other.svg", "<svg/>");

    let pipeline = Pipeline::new(
        fx.config(),
        FsObjectStore::new(fx.buckets.path()),
        fake_generator(),
    );
    let outcome = pipeline
        .run(&s3_event("assets", "icons/set1/home.svg"))
        .await
        .expect("run should succeed");

    let report = match outcome {
        RunOutcome::Completed(report) => report,
        other => panic!("expected Completed, got {other:?}"),
    };
    assert_eq!(report.collection.collection_name, "set1");
    assert_eq!(report.downloaded.len(), 2);
    assert!(report.download_failures.is_empty());
    assert_eq!(report.icons, 2);
    assert!(report.upload_failures.is_empty());
    assert!(report
        .manifest
        .contains(&"s3://assets/icons/set1/set1.json".to_string()));
    assert!(report
        .manifest
        .contains(&"s3://assets/icons/set1/set1.woff".to_string()));
    assert_eq!(report.manifest.len(), 7);

    let map: serde_json::Value =
        serde_json::from_str(&fx.read("assets", "icons/set1/set1.json").unwrap()).unwrap();
    assert_eq!(map, serde_json::json!({ "home": "\\f101", "star": "\\f102" }));
    assert!(fx
        .read("assets", "icons/set1/set1.css")
        .unwrap()
        .contains(".icon-star:before"));
    assert_eq!(fx.read("assets", "icons/set1/set1.svg"), None);
    assert_eq!(fx.read("assets", "icons/set10/set1.json"), None);

    assert!(fx.scratch_is_empty(), "scratch must be reclaimed");
}

#[tokio::test]
async fn irrelevant_trigger_makes_no_calls() {
    let fx = Fixture::new();
    let pipeline = Pipeline::new(fx.config(), MockObjectStore::new(), MockFontSynthesizer::new());

    for (key, expected) in [
        (
            "icons/set1/set1.css",
            SkipReason::UnsupportedExtension("css".to_string()),
        ),
        ("home.svg", SkipReason::NoCollectionName),
        ("icons/set1/README", SkipReason::NoExtension),
    ] {
        let outcome = pipeline
            .run_record(&TriggerRecord::from_encoded("assets", key))
            .await
            .expect("skip is not an error");
        match outcome {
            RunOutcome::Skipped(reason) => assert_eq!(reason, expected, "{key}"),
            other => panic!("expected Skipped for {key}, got {other:?}"),
        }
    }
    assert!(!fx.scratch.path().join("runs").exists());
}

fn flaky_store(failing: &'static [&'static str]) -> MockObjectStore {
    let mut store = MockObjectStore::new();
    store.expect_list_objects().returning(|_, prefix| {
        Ok(["home.svg", "star.svg", "cog.svg", "list.svg"]
            .iter()
            .map(|name| ObjectSummary::new(format!("{prefix}{name}")))
            .collect())
    });
    store.expect_get_object().returning(move |_, key| {
        if failing.iter().any(|f| key.ends_with(*f)) {
            Err("connection reset".into())
        } else {
            Ok(b"<svg/>".to_vec())
        }
    });
    store
}

#[tokio::test]
async fn partial_download_failure_still_publishes() {
    let fx = Fixture::new();
    let mut store = flaky_store(&["star.svg"]);
    store.expect_put_object().returning(|_, _, _, _| Ok(()));

    let mut synth = MockFontSynthesizer::new();
    synth.expect_generate().times(1).returning(|config| {
        assert_eq!(config.files.len(), 3);
        write_artifacts(config)
    });

    let pipeline = Pipeline::new(fx.config(), store, synth);
    let outcome = pipeline
        .run_record(&TriggerRecord::from_encoded("assets", "icons/set1/home.svg"))
        .await
        .expect("partial download failure is tolerated");

    let RunOutcome::Completed(report) = outcome else {
        panic!("expected Completed");
    };
    assert_eq!(report.downloaded.len(), 3);
    assert_eq!(report.download_failures.len(), 1);
    assert_eq!(report.download_failures[0].item, "icons/set1/star.svg");
    assert_eq!(report.icons, 3);
    assert!(fx.scratch_is_empty());
}

#[tokio::test]
async fn no_surviving_sources_fails_before_synthesis() {
    let fx = Fixture::new();
    let mut store = flaky_store(&["home.svg", "star.svg", "cog.svg", "list.svg"]);
    store.expect_put_object().never();
    let mut synth = MockFontSynthesizer::new();
    synth.expect_generate().never();

    let pipeline = Pipeline::new(fx.config(), store, synth);
    let err = pipeline
        .run_record(&TriggerRecord::from_encoded("assets", "icons/set1/home.svg"))
        .await
        .expect_err("nothing to synthesize");

    assert!(matches!(err, PipelineError::NothingToSynthesize));
    assert_eq!(err.phase(), Phase::Synthesize);
    assert!(fx.scratch_is_empty(), "failed run discards its scratch");
}

#[tokio::test]
async fn synthesis_failure_aborts_before_publishing() {
    let fx = Fixture::new();
    let mut store = flaky_store(&[]);
    store.expect_put_object().never();
    let mut synth = MockFontSynthesizer::new();
    synth
        .expect_generate()
        .times(1)
        .returning(|_| Err(SynthesisError::Other("glyph outline invalid".to_string())));

    let pipeline = Pipeline::new(fx.config(), store, synth);
    let err = pipeline
        .run_record(&TriggerRecord::from_encoded("assets", "icons/set1/home.svg"))
        .await
        .expect_err("synthesis failure is fatal");

    assert!(matches!(err, PipelineError::SynthesisFailed(_)));
    assert!(err.to_string().contains("glyph outline invalid"));
    assert!(fx.scratch_is_empty());
}

fn css_only_generator(css: &'static str) -> MockFontSynthesizer {
    let mut synth = MockFontSynthesizer::new();
    synth.expect_generate().returning(move |config: &FontConfig| {
        std::fs::write(config.stylesheet_path(), css).unwrap();
        let font: Box<dyn GeneratedFont> = Box::new(Stylesheet::new(css));
        Ok(font)
    });
    synth
}

#[tokio::test]
async fn empty_icon_map_is_fatal_by_default() {
    let fx = Fixture::new();
    let mut store = flaky_store(&[]);
    store.expect_put_object().never();

    let pipeline = Pipeline::new(fx.config(), store, css_only_generator("body {}"));
    let err = pipeline
        .run_record(&TriggerRecord::from_encoded("assets", "icons/set1/home.svg"))
        .await
        .expect_err("empty map");

    assert!(matches!(err, PipelineError::EmptyIconMap));
    assert_eq!(err.phase(), Phase::ExtractMap);
}

#[tokio::test]
async fn empty_icon_map_can_be_allowed() {
    let fx = Fixture::new();
    let mut store = flaky_store(&[]);
    store.expect_put_object().times(2).returning(|_, _, _, _| Ok(()));

    let mut config = fx.config();
    config.failure_policy.fail_on_empty_icon_map = false;
    let pipeline = Pipeline::new(config, store, css_only_generator("body {}"));
    let outcome = pipeline
        .run_record(&TriggerRecord::from_encoded("assets", "icons/set1/home.svg"))
        .await
        .expect("allowed");

    let RunOutcome::Completed(report) = outcome else {
        panic!("expected Completed");
    };
    assert_eq!(report.icons, 0);
    assert_eq!(
        report.manifest,
        vec![
            "s3://assets/icons/set1/set1.css".to_string(),
            "s3://assets/icons/set1/set1.json".to_string(),
        ]
    );
}

#[tokio::test]
async fn download_failure_ratio_threshold_aborts() {
    let fx = Fixture::new();
    let mut store = flaky_store(&["star.svg", "cog.svg"]);
    store.expect_put_object().never();
    let mut synth = MockFontSynthesizer::new();
    synth.expect_generate().never();

    let mut config = fx.config();
    config.failure_policy.max_download_failure_ratio = Some(0.25);
    let pipeline = Pipeline::new(config, store, synth);
    let err = pipeline
        .run_record(&TriggerRecord::from_encoded("assets", "icons/set1/home.svg"))
        .await
        .expect_err("too many failures");

    match err {
        PipelineError::TooManyFailures {
            phase,
            failed,
            total,
            ..
        } => {
            assert_eq!(phase, Phase::Download);
            assert_eq!((failed, total), (2, 4));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(fx.scratch_is_empty());
}

#[tokio::test]
async fn scratch_is_reclaimed_even_when_every_upload_fails() {
    let fx = Fixture::new();
    let mut store = flaky_store(&[]);
    store
        .expect_put_object()
        .returning(|_, _, _, _| Err("InternalError".into()));

    let pipeline = Pipeline::new(fx.config(), store, fake_generator());
    let outcome = pipeline
        .run_record(&TriggerRecord::from_encoded("assets", "icons/set1/home.svg"))
        .await
        .expect("upload failures are tolerated");

    let RunOutcome::Completed(report) = outcome else {
        panic!("expected Completed");
    };
    assert!(report.manifest.is_empty());
    assert_eq!(report.upload_failures.len(), 7);
    assert!(fx.scratch_is_empty());
}

#[tokio::test]
async fn concurrent_runs_use_separate_scratch() {
    let fx = Fixture::new();
    fx.put("assets", "icons/set1/home.svg", "<svg/>");
    fx.put("assets", "icons/set2/star.svg", "<svg/>");

    let mut synth = MockFontSynthesizer::new();
    synth.expect_generate().times(2).returning(|config| {
        let entries: Vec<_> = std::fs::read_dir(&config.dest)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1, "run sees only its own sources");
        write_artifacts(config)
    });
    let pipeline = Pipeline::new(fx.config(), FsObjectStore::new(fx.buckets.path()), synth);

    let first = TriggerRecord::from_encoded("assets", "icons/set1/home.svg");
    let second = TriggerRecord::from_encoded("assets", "icons/set2/star.svg");
    let (a, b) = tokio::join!(pipeline.run_record(&first), pipeline.run_record(&second));
    assert!(matches!(a, Ok(RunOutcome::Completed(_))));
    assert!(matches!(b, Ok(RunOutcome::Completed(_))));
    assert!(fx.read("assets", "icons/set1/set1.json").is_some());
    assert!(fx.read("assets", "icons/set2/set2.json").is_some());
    assert!(fx.scratch_is_empty());
}
