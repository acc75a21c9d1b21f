#![allow(unused_crate_dependencies)]

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use nlsub_client_core::newsletter::UrlProblem;
use nlsub_client_engine::{RegistryError, RegistryMirror};
use pretty_assertions::assert_eq;

use common::ScriptedService;

#[tokio::test]
async fn refresh_derives_names_and_drops_duplicates() {
    let service = Arc::new(ScriptedService::new());
    service.set_registry(&["https://www.alpha.com/news", "https://beta.io", "https://beta.io"]);
    let mut mirror = RegistryMirror::new(service.clone());

    let entries = mirror.refresh().await.unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["alpha.com", "beta.io"]);
}

#[tokio::test]
async fn invalid_urls_fail_before_any_request() {
    let service = Arc::new(ScriptedService::new());
    let mut mirror = RegistryMirror::new(service.clone());

    let err = mirror.add("   ").await.unwrap_err();
    assert_eq!(err, RegistryError::InvalidUrl(UrlProblem::Empty));
    let err = mirror.add("mailto:someone@x.com").await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidUrl(UrlProblem::UnsupportedScheme(_))));

    assert_eq!(service.replace_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn add_then_remove_restores_the_registry() {
    let service = Arc::new(ScriptedService::new());
    service.set_registry(&["https://alpha.com", "https://beta.io"]);
    let mut mirror = RegistryMirror::new(service.clone());
    mirror.refresh().await.unwrap();
    let before = mirror.urls();

    mirror.add(" https://gamma.dev/signup ").await.unwrap();
    assert!(mirror.contains("https://gamma.dev/signup"));
    assert_eq!(
        service.registry_urls(),
        vec!["https://alpha.com", "https://beta.io", "https://gamma.dev/signup"]
    );

    mirror.remove("https://gamma.dev/signup").await.unwrap();
    assert_eq!(mirror.urls(), before);
    assert_eq!(service.registry_urls(), before);
    assert_eq!(service.replace_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn adding_an_existing_url_keeps_the_set_unchanged() {
    let service = Arc::new(ScriptedService::new());
    service.set_registry(&["https://alpha.com"]);
    let mut mirror = RegistryMirror::new(service.clone());
    mirror.refresh().await.unwrap();

    mirror.add("https://alpha.com").await.unwrap();
    assert_eq!(mirror.urls(), vec!["https://alpha.com"]);
}

#[tokio::test]
async fn whole_list_replacement_is_last_writer_wins() {
    let service = Arc::new(ScriptedService::new());
    let mut mirror = RegistryMirror::new(service.clone());
    mirror.refresh().await.unwrap();

    mirror.add("https://alpha.com").await.unwrap();
    // Another client changes the registry behind our back.
    service.set_registry(&["https://alpha.com", "https://zeta.net"]);
    mirror.remove("https://nothing.example").await.unwrap();

    // The removal computed from the stale local view overwrote zeta, and the re-read shows it.
    assert_eq!(mirror.urls(), vec!["https://alpha.com"]);
}

#[tokio::test]
async fn mutations_on_a_fresh_mirror_keep_existing_entries() {
    let service = Arc::new(ScriptedService::new());
    service.set_registry(&["https://alpha.com", "https://beta.io"]);
    let mut mirror = RegistryMirror::new(service.clone());

    mirror.add("https://gamma.dev").await.unwrap();
    assert_eq!(
        service.registry_urls(),
        vec!["https://alpha.com", "https://beta.io", "https://gamma.dev"]
    );

    let mut other = RegistryMirror::new(service.clone());
    other.remove("https://gamma.dev").await.unwrap();
    assert_eq!(service.registry_urls(), vec!["https://alpha.com", "https://beta.io"]);
    assert_eq!(other.urls(), service.registry_urls());
}
