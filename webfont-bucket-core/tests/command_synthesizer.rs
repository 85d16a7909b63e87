#![cfg(unix)]
//! `CommandSynthesizer` against a real child process: a shell script that takes its
//! time before writing the stylesheet.

use std::os::unix::fs::PermissionsExt;
use std::time::{Duration, Instant};

use tempfile::tempdir;
use webfont_bucket_core::config::StyleConfig;
use webfont_bucket_core::contract::FontSynthesizer;
use webfont_bucket_core::icon_map::IconMap;
use webfont_bucket_core::synthesize::{CommandSynthesizer, FontConfig};
use webfont_bucket_core::trigger::CollectionContext;

const SLOW_GENERATOR: &str = r#"#!/bin/sh
out=""
name=""
while [ $# -gt 0 ]; do
  case "$1" in
    --out) out="$2"; shift 2 ;;
    --name) name="$2"; shift 2 ;;
    --*) shift 2 ;;
    *) break ;;
  esac
done
sleep 1
printf '.icon-home:before {\n    content: "\\f101";\n}\n' > "$out/$name.css"
"#;

#[tokio::test]
async fn generator_runs_without_blocking_the_runtime() {
    let tools = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let program = tools.path().join("slow-generator.sh");
    std::fs::write(&program, SLOW_GENERATOR).unwrap();
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
    std::fs::write(scratch.path().join("home.svg"), "<svg/>").unwrap();

    let context = CollectionContext {
        bucket: "assets".into(),
        source_prefix: "icons/set1".into(),
        collection_name: "set1".into(),
    };
    let config = FontConfig::for_collection(
        &StyleConfig::default(),
        &context,
        scratch.path(),
        vec![scratch.path().join("home.svg")],
    );
    let synth = CommandSynthesizer::new(program.to_string_lossy(), Vec::new());

    // Single-threaded test runtime: the timer only fires while the generator is
    // awaited, never while it blocks the thread.
    let ((generated, generator_done), timer_done) = tokio::join!(
        async {
            let font = synth.generate(&config).await;
            (font, Instant::now())
        },
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Instant::now()
        }
    );

    assert!(timer_done < generator_done);
    let font = generated.expect("generator succeeds");
    let map = IconMap::from_font(font.as_ref());
    assert_eq!(map.get("home"), Some(r"\f101"));
}
