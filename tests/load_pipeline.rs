//! End-to-end loads against real zip files and file-backed stores.

mod common;

use common::{Env, FixedPrompt, encoded, photos_zip, write_zip};
use image::{GenericImageView, ImageFormat};
use std::path::Path;
use std::sync::{Arc, Mutex};
use zipview::cache::ThumbnailCache;
use zipview::credentials::CredentialStore;
use zipview::password::EXTRACTION_FAILED;
use zipview::types::Bitmap;
use zipview::{CancelToken, DecodeSize, FileFlags, LoadOptions, ObjectInfo};

fn entry_sink() -> (Arc<Mutex<Vec<ObjectInfo>>>, impl Fn(&ObjectInfo) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |info: &ObjectInfo| sink.lock().unwrap().push(info.clone()))
}

// =========================================================================
// Unencrypted archives
// =========================================================================

#[test]
fn unencrypted_listing_has_entries_in_container_order_and_no_cache_writes() {
    let env = Env::new();
    let zip = photos_zip(env.dir.path(), None);
    env.credentials.add_fallback("never-needed");

    let info = env
        .loader()
        .load(&LoadOptions::new(&zip), &CancelToken::new())
        .unwrap()
        .unwrap();

    assert_eq!(info.flags, FileFlags::ARCHIVE);
    assert_eq!(info.source_paths.unwrap(), vec!["a.jpg", "b.png"]);
    assert!(env.thumbs.is_empty());
    // Stage 2 succeeded; no fallback was tried
    assert_eq!(env.backend.passwords_tried(), vec![None]);
}

#[test]
fn unencrypted_full_load_decodes_every_entry() {
    let env = Env::new();
    let zip = photos_zip(env.dir.path(), None);
    let (seen, sink) = entry_sink();

    let options = LoadOptions::new(&zip).load_image(true).on_entry(sink);
    env.loader().load(&options, &CancelToken::new()).unwrap().unwrap();

    let seen = seen.lock().unwrap();
    let dims: Vec<(u32, u32)> = seen.iter().map(|e| e.image.as_ref().unwrap().dimensions()).collect();
    assert_eq!(dims, vec![(640, 480), (200, 100)]);
    assert_eq!(seen[1].virtual_path, zip.join("b.png"));
    // No password was used, so nothing is stored
    assert_eq!(env.credentials.mapped(&zip), None);
}

// =========================================================================
// Encrypted archives
// =========================================================================

#[test]
fn prompted_password_is_stored_and_reused() {
    let env = Env::new();
    let zip = photos_zip(env.dir.path(), Some("secret"));
    let prompt = Arc::new(FixedPrompt::new("secret", false));
    let (seen, sink) = entry_sink();

    let options = LoadOptions::new(&zip)
        .file_names(["a.jpg"])
        .load_image(true)
        .on_entry(sink);
    let info = env
        .loader()
        .with_prompt(prompt.clone())
        .load(&options, &CancelToken::new())
        .unwrap()
        .unwrap();

    assert!(!info.has_error());
    assert_eq!(prompt.asked(), 1);
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].file_name, "a.jpg");
        assert!(seen[0].image.is_some());
    }
    assert_eq!(env.credentials.mapped(&zip).as_deref(), Some("secret"));
    assert!(env.credentials.fallbacks().is_empty());

    // Next load opens with the stored password at stage 1, no prompt
    let before = env.backend.passwords_tried().len();
    env.loader()
        .with_prompt(prompt.clone())
        .load(&LoadOptions::new(&zip).load_image(true), &CancelToken::new())
        .unwrap();
    assert_eq!(prompt.asked(), 1);
    assert_eq!(
        env.backend.passwords_tried()[before..],
        [Some("secret".to_string())]
    );
}

#[test]
fn stored_password_succeeds_without_trying_fallbacks() {
    let env = Env::new();
    let zip = photos_zip(env.dir.path(), Some("secret"));
    env.credentials.set_mapped(&zip, "secret");
    env.credentials.add_fallback("wrong-1");
    env.credentials.add_fallback("wrong-2");

    let info = env
        .loader()
        .load(&LoadOptions::new(&zip).load_image(true), &CancelToken::new())
        .unwrap()
        .unwrap();

    assert!(!info.has_error());
    assert_eq!(env.backend.passwords_tried(), vec![Some("secret".to_string())]);
}

#[test]
fn remembered_password_opens_other_archives() {
    let env = Env::new();
    let first = photos_zip(env.dir.path(), Some("shared"));
    let other = env.dir.path().join("other.zip");
    let png = encoded(8, 8, ImageFormat::Png);
    write_zip(&other, &[("x.png", &png[..])], Some("shared"));

    let prompt = Arc::new(FixedPrompt::new("shared", true));
    env.loader()
        .with_prompt(prompt.clone())
        .load(&LoadOptions::new(&first).load_image(true), &CancelToken::new())
        .unwrap();
    assert_eq!(env.credentials.fallbacks(), vec!["shared"]);

    let info = env
        .loader()
        .with_prompt(prompt.clone())
        .load(&LoadOptions::new(&other).load_image(true), &CancelToken::new())
        .unwrap()
        .unwrap();
    assert!(!info.has_error());
    assert_eq!(prompt.asked(), 1, "fallback opened the second archive");
    assert_eq!(env.credentials.mapped(&other).as_deref(), Some("shared"));
}

#[test]
fn exhausted_cascade_reports_error_flag() {
    let env = Env::new();
    let zip = photos_zip(env.dir.path(), Some("secret"));
    let (seen, sink) = entry_sink();

    let options = LoadOptions::new(&zip).load_image(true).on_container(sink);
    let info = env
        .loader()
        .load(&options, &CancelToken::new())
        .unwrap()
        .unwrap();

    assert!(info.has_error());
    assert_eq!(info.comments.as_deref(), Some(EXTRACTION_FAILED));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn corrupt_archive_is_soft() {
    let env = Env::new();
    let zip = env.dir.path().join("broken.zip");
    let mut junk = b"PK\x03\x04".to_vec();
    junk.extend(std::iter::repeat_n(0x5a, 512));
    std::fs::write(&zip, junk).unwrap();

    let info = env
        .loader()
        .load(&LoadOptions::new(&zip).load_image(true), &CancelToken::new())
        .unwrap()
        .unwrap();
    assert!(info.has_error());
}

// =========================================================================
// Thumbnail cache
// =========================================================================

#[test]
fn cached_thumbnail_is_reused_without_extraction() {
    let env = Env::new();
    let zip = photos_zip(env.dir.path(), Some("secret"));
    env.credentials.set_mapped(&zip, "secret");
    let loader = env.loader();
    let size = loader.thumbnail_size();

    let mut info = ObjectInfo::new(&zip, FileFlags::ARCHIVE);
    let first: Bitmap = loader.image_for(&mut info, Some("a.jpg"), size, true).unwrap();
    assert_eq!(env.backend.extractions(), 1);
    assert_eq!(env.thumbs.len(), 1);

    let mut info = ObjectInfo::new(&zip, FileFlags::ARCHIVE);
    let second = loader.image_for(&mut info, Some("a.jpg"), size, true).unwrap();
    assert_eq!(env.backend.extractions(), 1, "served from cache");
    assert_eq!(first.to_rgba8(), second.to_rgba8());
    // 640x480 fitted to 300x300 by height
    assert_eq!(second.dimensions(), (400, 300));
}

#[test]
fn other_sizes_bypass_cache() {
    let env = Env::new();
    let zip = photos_zip(env.dir.path(), None);
    let loader = env.loader();

    for _ in 0..2 {
        let mut info = ObjectInfo::new(&zip, FileFlags::ARCHIVE);
        let img = loader
            .image_for(&mut info, Some("a.jpg"), DecodeSize::new(64, 64), true)
            .unwrap();
        assert_eq!(img.dimensions(), (85, 64));
    }
    assert_eq!(env.backend.extractions(), 2);
    assert!(env.thumbs.is_empty());
}

#[test]
fn cache_survives_reopen() {
    let env = Env::new();
    let zip = photos_zip(env.dir.path(), None);
    let size = env.loader().thumbnail_size();
    let mut info = ObjectInfo::new(&zip, FileFlags::ARCHIVE);
    env.loader().image_for(&mut info, Some("b.png"), size, true).unwrap();

    let reopened =
        zipview::cache::SqliteThumbnailCache::open(&env.dir.path().join("db/thumbs.sqlite")).unwrap();
    let key = zipview::cache::ThumbKey::new(&zip, "b.png", size);
    assert!(reopened.contains(&key));
}

// =========================================================================
// Orientation
// =========================================================================

#[test]
fn exif_rotation_applies_to_archive_entries() {
    use base64::Engine;
    // JPEG 2x1 with EXIF orientation 6
    const ORIENT6: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );
    let jpeg = base64::engine::general_purpose::STANDARD.decode(ORIENT6).unwrap();
    let env = Env::new();
    let zip = env.dir.path().join("rotated.zip");
    write_zip(&zip, &[("r.jpg", &jpeg[..])], None);

    let mut info = ObjectInfo::new(&zip, FileFlags::ARCHIVE);
    let img = env
        .loader()
        .image_for(&mut info, Some("r.jpg"), DecodeSize::default(), false)
        .unwrap();
    assert_eq!(img.dimensions(), (1, 2));
}

// =========================================================================
// Directories and plain images
// =========================================================================

#[test]
fn directory_listing_and_image_access() {
    let env = Env::new();
    let album = env.dir.path().join("album");
    std::fs::create_dir(&album).unwrap();
    for (name, w) in [("img10.png", 10), ("img2.png", 2), ("img1.png", 1)] {
        std::fs::write(album.join(name), encoded(w, 5, ImageFormat::Png)).unwrap();
    }
    let loader = env.loader();
    let mut info = ObjectInfo::new(&album, FileFlags::DIRECTORY);

    let names = loader.source_paths(&mut info).unwrap().to_vec();
    assert_eq!(names, vec!["img1.png", "img2.png", "img10.png"]);
    let img = loader
        .image_at(&mut info, 2, DecodeSize::default(), true)
        .unwrap();
    assert_eq!(img.width(), 10);
}

#[test]
fn extract_file_reads_encrypted_entry_with_stored_password() {
    let env = Env::new();
    let zip = photos_zip(env.dir.path(), Some("secret"));
    env.credentials.set_mapped(Path::new(&zip), "secret");

    let file = env.loader().extract_file(&zip, "b.png").unwrap().unwrap();
    assert_eq!(file.entry.name, "b.png");
    assert_eq!(image::load_from_memory(&file.bytes).unwrap().dimensions(), (200, 100));
}
