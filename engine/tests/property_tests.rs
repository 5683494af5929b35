use alkulous_engine::conductor::context::compose;
use alkulous_engine::db::{ConversationStore, Database};
use chrono::{Duration, Utc};
use proptest::prelude::*;
use sdk::types::{ChatTurn, Role};

fn turns_newest_first(count: usize) -> Vec<ChatTurn> {
    let base = Utc::now();
    (0..count)
        .rev()
        .map(|i| ChatTurn {
            id: i as i64 + 1,
            role: if i % 2 == 0 { Role::User } else { Role::Assistant },
            content: format!("turn {}", i),
            timestamp: base + Duration::milliseconds(i as i64),
        })
        .collect()
}

// Context never exceeds window + 2 and is framed by system prompt and new message
proptest! {
    #[test]
    fn test_context_length_bound(
        stored in 0usize..40,
        window in 1usize..20,
        message in "[a-z ]{1,30}",
    ) {
        let recent: Vec<ChatTurn> = turns_newest_first(stored)
            .into_iter()
            .take(window)
            .collect();

        let messages = compose("sys", &recent, &message);

        prop_assert_eq!(messages.len(), recent.len() + 2);
        prop_assert!(messages.len() <= window + 2);
        prop_assert_eq!(messages[0].role, Role::System);
        prop_assert_eq!(&messages.last().unwrap().content, &message);
    }
}

// History between the framing messages is chronological
proptest! {
    #[test]
    fn test_context_history_is_chronological(stored in 0usize..40, window in 1usize..20) {
        let recent: Vec<ChatTurn> = turns_newest_first(stored)
            .into_iter()
            .take(window)
            .collect();

        let messages = compose("sys", &recent, "next");
        let history: Vec<usize> = messages[1..messages.len() - 1]
            .iter()
            .map(|m| m.content.trim_start_matches("turn ").parse().unwrap())
            .collect();

        prop_assert!(history.windows(2).all(|w| w[0] < w[1]));
        if let Some(last) = history.last() {
            prop_assert_eq!(*last, stored - 1);
        }
    }
}

// Store reads honour the limit and end with the latest write
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]
    #[test]
    fn test_store_recent_bound(writes in 0usize..25, limit in 1usize..15) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::TempDir::new().unwrap();
            let db = Database::new(&dir.path().join("alkulous.db")).await.unwrap();
            let store = db.messages();

            for i in 0..writes {
                store.append(Role::User, &format!("w{}", i)).await.unwrap();
            }

            let mut recent = store.recent(limit).await.unwrap();
            assert_eq!(recent.len(), writes.min(limit));

            recent.reverse();
            assert!(recent.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
            if writes > 0 {
                assert_eq!(recent.last().unwrap().content, format!("w{}", writes - 1));
            }
            db.close().await.unwrap();
        });
    }
}
