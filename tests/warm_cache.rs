mod common;

use common::{Env, FixedPrompt, encoded, photos_zip};
use image::ImageFormat;
use std::sync::Arc;
use zipview::CancelToken;
use zipview::credentials::CredentialStore;
use zipview::warm::warm_cache;

#[test]
fn warm_uses_stored_passwords_and_never_prompts() {
    let env = Env::new();
    let root = env.dir.path().join("library");
    std::fs::create_dir(&root).unwrap();
    let locked = photos_zip(&root, Some("secret"));
    std::fs::write(root.join("cover.png"), encoded(30, 30, ImageFormat::Png)).unwrap();
    env.credentials.add_fallback("secret");

    let prompt = Arc::new(FixedPrompt::new("secret", false));
    let loader = env.loader().with_prompt(prompt.clone());
    let summary = warm_cache(&loader, &root, &CancelToken::new(), 2, None).unwrap();

    assert_eq!((summary.total, summary.decoded, summary.failed), (2, 2, 0));
    assert_eq!(prompt.asked(), 0);
    assert!(loader.has_thumbnail(&locked, "a.jpg"));
    assert_eq!(env.credentials.mapped(&locked).as_deref(), Some("secret"));
}

#[test]
fn locked_archive_without_password_fails_quietly() {
    let env = Env::new();
    let root = env.dir.path().join("library");
    std::fs::create_dir(&root).unwrap();
    photos_zip(&root, Some("secret"));

    let prompt = Arc::new(FixedPrompt::new("secret", false));
    let loader = env.loader().with_prompt(prompt.clone());
    let summary = warm_cache(&loader, &root, &CancelToken::new(), 1, None).unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(prompt.asked(), 0);
    assert!(env.thumbs.is_empty());
}
