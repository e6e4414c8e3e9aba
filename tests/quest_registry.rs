/// Integration tests for the quest registry: idempotent creation, dotted-path
/// resolution, disposal, persistence, and the active-quest index.
mod common;

use std::sync::Arc;

use questline::config::QuestsConfig;
use questline::errors::QuestError;
use questline::host::PlayerId;
use questline::quest::{AcceptOutcome, CompletionStatus, CurrentStatus, DISPLAY_KEY};

#[test]
fn create_twice_keeps_original_display_name() {
    let fx = common::fixture();
    let first = fx.registry.create("Main", "The Main Quest").unwrap();
    let second = fx.registry.create("MAIN", "Something Else").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.display_name(), "The Main Quest");
    assert_eq!(fx.registry.list().len(), 1);
    assert_eq!(
        fx.store
            .get("quests.main")
            .unwrap()
            .expect("record")
            .get(DISPLAY_KEY),
        Some("The Main Quest")
    );
}

#[test]
fn names_are_validated_not_truncated() {
    let fx = common::fixture();
    for bad in ["", "has space", "dotted.name", "bang!"] {
        assert!(
            matches!(fx.registry.create(bad, "x"), Err(QuestError::InvalidName(_))),
            "'{}' should be rejected",
            bad
        );
    }
    let long = "a".repeat(33);
    assert!(fx.registry.create(&long, "x").is_err());
    assert!(fx.registry.get(&long[..32]).is_none());
    assert!(fx.registry.create(&long[..32], "x").is_ok());
}

#[test]
fn dotted_path_matches_manual_walk() {
    let fx = common::fixture();
    let a = fx.registry.create("a", "A").unwrap();
    let b = a.create_child("b", "B").unwrap();
    b.create_child("c", "C").unwrap();

    let walked = fx
        .registry
        .get("a")
        .and_then(|q| q.child("b"))
        .and_then(|q| q.child("c"))
        .expect("walk");
    let resolved = fx.registry.get("a.b.c").expect("path");
    assert!(Arc::ptr_eq(&walked, &resolved));
    assert_eq!(resolved.path(), "a.b.c");

    assert!(fx.registry.get("a.b.missing").is_none());
    assert!(fx.registry.get("missing.b.c").is_none());
}

#[test]
fn accept_and_finish_drive_active_quests() {
    let fx = common::fixture();
    let alice = PlayerId::from("alice");
    let main = fx.registry.create("main", "Main").unwrap();
    let chapter = main.create_child("chapter1", "Chapter One").unwrap();

    let status = main.status(&alice);
    assert_eq!(status.current, CurrentStatus::NotStarted);
    assert_eq!(status.completion, CompletionStatus::NotCompleted);

    assert_eq!(main.accept(&alice), AcceptOutcome::Started);
    assert_eq!(chapter.accept(&alice), AcceptOutcome::Started);
    let active: Vec<String> = fx
        .registry
        .active_quests(&alice)
        .iter()
        .map(|q| q.path().to_string())
        .collect();
    assert_eq!(active, vec!["main".to_string(), "main.chapter1".to_string()]);

    assert!(chapter.finish(&alice));
    assert_eq!(chapter.status(&alice).completion, CompletionStatus::Completed);
    let active: Vec<String> = fx
        .registry
        .active_quests(&alice)
        .iter()
        .map(|q| q.path().to_string())
        .collect();
    assert_eq!(active, vec!["main".to_string()]);

    // other players are unaffected
    assert!(fx.registry.active_quests(&PlayerId::from("bob")).is_empty());
}

#[test]
fn repeatable_default_comes_from_settings() {
    let fx = common::fixture_with(QuestsConfig {
        repeatable_by_default: true,
        ..QuestsConfig::default()
    });
    let alice = PlayerId::from("alice");
    let quest = fx.registry.create("daily", "Daily Chores").unwrap();
    let sub = quest.create_child("sweep", "Sweep").unwrap();
    assert!(quest.is_repeatable());
    assert!(sub.is_repeatable());

    quest.accept(&alice);
    quest.finish(&alice);
    assert_eq!(quest.accept(&alice), AcceptOutcome::Restarted);
    assert!(quest.is_in_progress(&alice));
}

#[test]
fn stored_quests_come_back_as_created_only() {
    let fx = common::fixture();
    fx.registry.create("main", "Main").unwrap();
    fx.registry.create("side", "Side").unwrap();

    let fx = common::reopen(fx);
    assert!(fx.registry.list().is_empty());
    let created: Vec<(String, String)> = fx
        .registry
        .list_created()
        .iter()
        .map(|q| (q.name().to_string(), q.display_name()))
        .collect();
    assert_eq!(
        created,
        vec![
            ("main".to_string(), "Main".to_string()),
            ("side".to_string(), "Side".to_string())
        ]
    );

    // re-declaring promotes the stored record back to current
    let main = fx.registry.create("main", "Main Renamed").unwrap();
    assert!(Arc::ptr_eq(&main, &fx.registry.get("main").unwrap()));
    assert_eq!(main.display_name(), "Main Renamed");
    assert_eq!(fx.registry.list().len(), 1);
}

#[test]
fn dispose_discards_record_and_progress_index() {
    let fx = common::fixture();
    let alice = PlayerId::from("alice");
    let main = fx.registry.create("main", "Main").unwrap();
    main.create_child("chapter1", "One").unwrap().accept(&alice);
    main.accept(&alice);

    assert!(fx.registry.dispose(&main).unwrap());
    assert!(fx.registry.get("main").is_none());
    assert!(fx.registry.list_created().is_empty());
    assert!(!fx.store.exists("quests.main").unwrap());
    assert!(fx.registry.index().snapshot(&alice).is_empty());

    let fx = common::reopen(fx);
    assert!(fx.registry.list_created().is_empty());
}

#[test]
fn set_display_name_persists_for_primary() {
    let fx = common::fixture();
    let main = fx.registry.create("main", "Main").unwrap();
    fx.registry.set_display_name(&main, "Main (Revised)").unwrap();

    let fx = common::reopen(fx);
    let stored = fx.registry.list_created();
    assert_eq!(stored[0].display_name(), "Main (Revised)");
}

#[test]
fn concurrent_accepts_keep_index_consistent() {
    let fx = common::fixture();
    let quest = fx.registry.create("main", "Main").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let quest = Arc::clone(&quest);
            std::thread::spawn(move || {
                let player = PlayerId::new(format!("player{}", i));
                for _ in 0..50 {
                    quest.accept(&player);
                    quest.finish(&player);
                    quest.reset(&player);
                }
                quest.accept(&player);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..8 {
        let player = PlayerId::new(format!("player{}", i));
        assert!(quest.is_in_progress(&player));
        assert!(fx.registry.index().contains(&player, "main"));
    }
    assert_eq!(fx.registry.index().player_count(), 8);
}
