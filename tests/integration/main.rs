//! Integration tests for prompt-pulse

mod disk_cache_tests {
    use prompt_pulse::cache::{digest, CacheOptions, DiskCache};
    use serial_test::serial;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const KIB: usize = 1024;

    async fn open(dir: &Path, max_size_mb: i64) -> DiskCache {
        DiskCache::open(CacheOptions::new(dir).max_size_mb(max_size_mb))
            .await
            .unwrap()
    }

    fn leftover_temp_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".tmp-"))
            .collect()
    }

    #[tokio::test]
    async fn basic_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = open(dir.path(), 50).await;
        let value = br#"{"name":"test","count":42}"#;

        cache.put("mykey", value).await.unwrap();

        assert_eq!(cache.get("mykey").await.unwrap(), value);
        assert_eq!(cache.stats().await.hits, 1);
        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn lru_with_small_budget() {
        let dir = TempDir::new().unwrap();
        let cache = open(dir.path(), 1).await;
        let payload = vec![b'x'; 500 * KIB];

        for key in ["first", "second", "third"] {
            cache.put(key, &payload).await.unwrap();
        }

        assert!(cache.get("first").await.is_none());
        assert!(cache.get("second").await.is_some());
        assert!(cache.get("third").await.is_some());
        assert!(cache.stats().await.evictions >= 1);
        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn access_promotes_entry() {
        let dir = TempDir::new().unwrap();
        let cache = open(dir.path(), 1).await;
        let payload = vec![b'y'; 400 * KIB];

        cache.put("first", &payload).await.unwrap();
        cache.put("second", &payload).await.unwrap();
        assert!(cache.get("first").await.is_some());
        cache.put("third", &payload).await.unwrap();

        assert!(cache.has("first").await);
        assert!(cache.has("third").await);
        assert!(!cache.has("second").await);
        assert_eq!(cache.stats().await.evictions, 1);
        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn payload_file_is_visible_and_complete() {
        let dir = TempDir::new().unwrap();
        let cache = open(dir.path(), 50).await;
        let payload = b"atomic payload contents".to_vec();

        cache.put("atomic", &payload).await.unwrap();

        let on_disk = std::fs::read(dir.path().join(format!("{}.cache", digest("atomic")))).unwrap();
        assert_eq!(on_disk, payload);
        assert!(leftover_temp_files(dir.path()).is_empty());
        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn overwrite_replaces_size() {
        let dir = TempDir::new().unwrap();
        let cache = open(dir.path(), 50).await;

        cache.put("k", b"a much longer first value").await.unwrap();
        cache.put("k", b"v2").await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), b"v2");
        assert_eq!(cache.size().await, 2);
        assert_eq!(cache.len().await, 1);
        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn least_recently_used_is_evicted_first() {
        let dir = TempDir::new().unwrap();
        let cache = open(dir.path(), 1).await;
        let payload = vec![b'z'; 300 * KIB];

        cache.put("a", &payload).await.unwrap();
        cache.put("b", &payload).await.unwrap();
        cache.put("c", &payload).await.unwrap();
        // Touch a and b so c becomes the oldest
        cache.get("a").await.unwrap();
        cache.get("b").await.unwrap();
        cache.put("d", &payload).await.unwrap();

        assert_eq!(cache.stats().await.evictions, 1);
        assert!(!cache.has("c").await);
        for key in ["a", "b", "d"] {
            assert!(cache.has(key).await, "{key} should survive");
        }
        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn zero_ttl_never_expires() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::open(
            CacheOptions::new(dir.path())
                .default_ttl(Duration::ZERO)
                .cleanup_interval(Duration::from_millis(20)),
        )
        .await
        .unwrap();

        cache.put("forever", b"v").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.get("forever").await.unwrap(), b"v");
        cache.close().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn ttl_expires_and_sweeper_removes_files() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::open(
            CacheOptions::new(dir.path()).cleanup_interval(Duration::from_millis(50)),
        )
        .await
        .unwrap();

        cache
            .put_with_ttl("short", b"v", Duration::from_millis(100))
            .await
            .unwrap();
        assert!(cache.has("short").await);

        tokio::time::sleep(Duration::from_millis(400)).await;

        let stem = digest("short");
        assert!(!dir.path().join(format!("{stem}.cache")).exists());
        assert!(!dir.path().join(format!("{stem}.meta")).exists());
        assert!(cache.get("short").await.is_none());
        assert_eq!(cache.size().await, 0);
        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn restart_recovers_entries() {
        let dir = TempDir::new().unwrap();
        let values: Vec<(String, Vec<u8>)> = (0..10)
            .map(|i| (format!("key-{i}"), vec![b'a' + i as u8; 100 + i]))
            .collect();

        let cache = open(dir.path(), 50).await;
        for (key, value) in &values {
            cache.put(key, value).await.unwrap();
        }
        cache.close().await.unwrap();
        drop(cache);

        let reopened = open(dir.path(), 50).await;
        let expected_size: u64 = values.iter().map(|(_, v)| v.len() as u64).sum();
        assert_eq!(reopened.size().await, expected_size);
        assert_eq!(reopened.len().await, values.len());
        for (key, value) in &values {
            assert_eq!(&reopened.get(key).await.unwrap(), value);
        }
        reopened.close().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn restart_skips_expired_entries() {
        let dir = TempDir::new().unwrap();

        let cache = open(dir.path(), 50).await;
        cache
            .put_with_ttl("stale", b"old", Duration::from_millis(50))
            .await
            .unwrap();
        cache.put("fresh", b"new").await.unwrap();
        cache.close().await.unwrap();
        drop(cache);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let reopened = open(dir.path(), 50).await;
        reopened.sweep().await;
        assert_eq!(reopened.keys().await, vec!["fresh".to_string()]);

        let stem = digest("stale");
        assert!(!dir.path().join(format!("{stem}.cache")).exists());
        assert!(!dir.path().join(format!("{stem}.meta")).exists());
        reopened.close().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn concurrent_readers_see_whole_values() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(open(dir.path(), 50).await);
        let v1 = vec![b'1'; 64 * KIB];
        let v2 = vec![b'2'; 96 * KIB];
        cache.put("shared", &v1).await.unwrap();

        let writer = {
            let cache = Arc::clone(&cache);
            let (v1, v2) = (v1.clone(), v2.clone());
            tokio::spawn(async move {
                for i in 0..50 {
                    let value = if i % 2 == 0 { &v2 } else { &v1 };
                    cache.put("shared", value).await.unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let (len1, len2) = (v1.len(), v2.len());
                tokio::spawn(async move {
                    for _ in 0..50 {
                        if let Some(value) = cache.get("shared").await {
                            assert!(value.len() == len1 || value.len() == len2);
                            assert!(value.iter().all(|b| *b == value[0]));
                        }
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert!(leftover_temp_files(dir.path()).is_empty());
        cache.close().await.unwrap();
    }

    #[test]
    fn digest_is_stable_hex() {
        let d = digest("weather:berlin");
        assert_eq!(d.len(), 16);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(d, digest("weather:berlin"));
        assert_ne!(d, digest("weather:paris"));
    }
}

mod prefetch_tests {
    use async_trait::async_trait;
    use prompt_pulse::error::{PulseError, PulseResult};
    use prompt_pulse::image::{ImageCache, ImageKey};
    use prompt_pulse::prefetch::{Prefetcher, Renderer, DEFAULT_PROTOCOL};
    use prompt_pulse::session::SessionManager;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeRenderer {
        calls: AtomicUsize,
        done: AtomicUsize,
    }

    #[async_trait]
    impl Renderer for FakeRenderer {
        async fn render_file(&self, _path: &Path, _w: u32, _h: u32) -> PulseResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.done.fetch_add(1, Ordering::SeqCst);
            Ok(b"R".to_vec())
        }
    }

    fn image_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in ["a.png", "b.jpg", "c.jpeg"] {
            std::fs::write(dir.path().join(name), format!("image {name}")).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn session_persists_within_process() {
        let images = image_dir();
        let manager = SessionManager::new(images.path());

        let first = manager.get_or_create().await.unwrap();
        let second = manager.get_or_create().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.image_path, second.image_path);
        assert_eq!(first.content_hash.len(), 16);
        assert!(first
            .content_hash
            .chars()
            .all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        assert_eq!(first.id, format!("ppulse-{}", std::process::id()));
    }

    #[tokio::test]
    async fn prefetch_miss_then_hit() {
        let images = image_dir();
        let renders = TempDir::new().unwrap();
        let session = SessionManager::new(images.path())
            .get_or_create()
            .await
            .unwrap();
        let renderer = Arc::new(FakeRenderer::default());
        let cache = Arc::new(ImageCache::open(renders.path(), 1 << 20).await.unwrap());
        let prefetcher = Prefetcher::new(cache, renderer.clone());

        let first = prefetcher.prefetch(&session, 40, 20).await.await.unwrap();
        assert!(!first.from_cache);
        assert!(first.duration >= Duration::from_millis(15));
        assert_eq!(first.rendered.unwrap(), b"R");

        let second = prefetcher.prefetch(&session, 40, 20).await.await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.duration, Duration::ZERO);
        assert_eq!(second.rendered.unwrap(), b"R");

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        prefetcher.close().await;
    }

    #[tokio::test]
    async fn cached_render_skips_renderer() {
        let images = image_dir();
        let renders = TempDir::new().unwrap();
        let session = SessionManager::new(images.path())
            .get_or_create()
            .await
            .unwrap();
        let cache = Arc::new(ImageCache::open(renders.path(), 1 << 20).await.unwrap());
        cache
            .put(
                &ImageKey::new(&session.content_hash, DEFAULT_PROTOCOL, 12, 6),
                b"pre-rendered",
            )
            .await
            .unwrap();

        let renderer = Arc::new(FakeRenderer::default());
        let prefetcher = Prefetcher::new(cache, renderer.clone());
        let result = prefetcher.prefetch(&session, 12, 6).await.await.unwrap();

        assert!(result.from_cache);
        assert_eq!(result.rendered.unwrap(), b"pre-rendered");
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(prefetcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn close_waits_for_every_worker() {
        let images = image_dir();
        let renders = TempDir::new().unwrap();
        let session = SessionManager::new(images.path())
            .get_or_create()
            .await
            .unwrap();
        let renderer = Arc::new(FakeRenderer::default());
        let cache = Arc::new(ImageCache::open(renders.path(), 1 << 20).await.unwrap());
        let prefetcher = Prefetcher::new(cache, renderer.clone());

        let mut receivers = Vec::new();
        for width in 1..=6 {
            receivers.push(prefetcher.prefetch(&session, width, 10).await);
        }
        // Let the workers reach the renderer before closing
        tokio::time::sleep(Duration::from_millis(5)).await;
        prefetcher.close().await;

        assert_eq!(prefetcher.in_flight(), 0);
        assert_eq!(
            renderer.calls.load(Ordering::SeqCst),
            renderer.done.load(Ordering::SeqCst)
        );
        for mut rx in receivers {
            let result = rx.try_recv().unwrap();
            assert!(
                result.is_ok() || matches!(result.rendered, Err(PulseError::Cancelled)),
                "unexpected result: {result:?}"
            );
        }
    }
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use prompt_pulse::config::Config;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn ppulse() -> Command {
        cargo_bin_cmd!("ppulse")
    }

    /// Config that keeps every directory inside `dir` and renders with `sh`
    fn write_config(dir: &Path) -> PathBuf {
        let mut config = Config::default();
        config.cache.dir = Some(dir.join("kv"));
        config.images.dir = Some(dir.join("images"));
        config.images.cache_dir = Some(dir.join("renders"));
        config.render.program = "sh".to_string();
        config.render.args = vec![
            "-c".to_string(),
            "printf 'R:%s:%s' {width} {protocol}".to_string(),
        ];

        let path = dir.join("config.toml");
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        path
    }

    fn with_config(config: &Path) -> Command {
        let mut cmd = ppulse();
        cmd.arg("--config").arg(config);
        cmd
    }

    #[test]
    fn help_displays() {
        ppulse()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("artifact cache"));
    }

    #[test]
    fn version_displays() {
        ppulse()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("ppulse"));
    }

    #[test]
    fn cache_put_then_get() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        with_config(&config)
            .args(["cache", "put", "weather", "sunny"])
            .assert()
            .success();
        with_config(&config)
            .args(["cache", "get", "weather"])
            .assert()
            .success()
            .stdout("sunny");
    }

    #[test]
    fn cache_put_reads_stdin() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        with_config(&config)
            .args(["cache", "put", "k8s"])
            .write_stdin("3 pods ready")
            .assert()
            .success();
        with_config(&config)
            .args(["cache", "get", "k8s"])
            .assert()
            .success()
            .stdout("3 pods ready");
    }

    #[test]
    fn cache_get_missing_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        with_config(&config)
            .args(["cache", "get", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Key not cached"));
    }

    #[test]
    fn cache_rm_and_has() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        with_config(&config)
            .args(["cache", "put", "git", "clean"])
            .assert()
            .success();
        with_config(&config)
            .args(["cache", "has", "git"])
            .assert()
            .success();
        with_config(&config)
            .args(["cache", "rm", "git"])
            .assert()
            .success();
        with_config(&config)
            .args(["cache", "has", "git"])
            .assert()
            .failure();
    }

    #[test]
    fn cache_keys_and_stats() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        for key in ["alpha", "beta"] {
            with_config(&config)
                .args(["cache", "put", key, "v"])
                .assert()
                .success();
        }

        with_config(&config)
            .args(["cache", "keys"])
            .assert()
            .success()
            .stdout(predicate::str::contains("alpha").and(predicate::str::contains("beta")));
        with_config(&config)
            .args(["cache", "stats", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"entries\": 2"));
    }

    #[test]
    fn cache_clear_with_yes() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        with_config(&config)
            .args(["cache", "put", "a", "1"])
            .assert()
            .success();
        with_config(&config)
            .args(["cache", "clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 1 entries"));
        with_config(&config)
            .args(["cache", "keys"])
            .assert()
            .success()
            .stdout("");
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        with_config(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        with_config(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]").and(predicate::str::contains("[render]")));
    }

    #[test]
    fn config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        with_config(&path)
            .args(["config", "init"])
            .assert()
            .success();
        assert!(path.exists());
    }

    #[test]
    fn session_without_images_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        with_config(&config)
            .args(["session", "--pid", "4242"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No images found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn session_json() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        std::fs::create_dir(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images").join("cat.png"), b"meow").unwrap();

        with_config(&config)
            .args(["session", "--pid", "4242", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"id\": \"ppulse-4242\""))
            .stdout(predicate::str::contains("cat.png"));
    }

    #[cfg(unix)]
    #[test]
    fn prefetch_renders_then_serves_from_cache() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        std::fs::create_dir(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images").join("cat.png"), b"meow").unwrap();

        for _ in 0..2 {
            with_config(&config)
                .args(["prefetch", "--width", "10", "--height", "5", "--protocol", "kitty"])
                .assert()
                .success()
                .stdout("R:10:kitty");
        }

        with_config(&config)
            .args(["image", "stats", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"entries\": 1"));
    }

    #[test]
    fn image_clear_empty() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());

        with_config(&config)
            .args(["image", "clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already empty"));
    }

    #[test]
    fn completions_generate() {
        ppulse()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ppulse"));
    }
}
