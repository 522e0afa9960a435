//! Conversation store tests on throwaway directories.

use lmchat::llm::GenerationConfig;
use lmchat::storage::ConversationStore;

fn store() -> (tempfile::TempDir, ConversationStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = ConversationStore::new(dir.path().join("conversations")).unwrap();
    (dir, store)
}

#[test]
fn create_then_load_round_trips() {
    let (_dir, store) = store();

    let id = store.create_conversation().unwrap();
    let conversation = store.load_conversation(&id).unwrap();

    assert_eq!(conversation.conversation_id, id);
    assert!(conversation.messages.is_empty());
    assert_eq!(conversation.metadata.total_messages, 0);
    assert!(conversation.metadata.model_config.is_none());
}

#[test]
fn add_message_appends_and_updates_metadata() {
    let (_dir, store) = store();
    let id = store.create_conversation().unwrap();

    store.add_message(&id, "user", "hi", None).unwrap();
    store
        .add_message(&id, "assistant", "hello", Some(GenerationConfig::default()))
        .unwrap();

    let conversation = store.load_conversation(&id).unwrap();
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[0].role, "user");
    assert_eq!(conversation.messages[0].content, "hi");
    assert_eq!(conversation.messages[1].role, "assistant");
    assert_eq!(conversation.metadata.total_messages, 2);
    assert!(conversation.metadata.model_config.is_some());
    assert!(conversation.updated_at >= conversation.created_at);
}

#[test]
fn add_message_to_unknown_conversation_errors() {
    let (_dir, store) = store();
    let err = store.add_message("missing", "user", "hi", None).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn get_messages_respects_limit() {
    let (_dir, store) = store();
    let id = store.create_conversation().unwrap();
    for i in 0..5 {
        store
            .add_message(&id, "user", &format!("message {}", i), None)
            .unwrap();
    }

    let all = store.get_messages(&id, None);
    assert_eq!(all.len(), 5);

    let last_two = store.get_messages(&id, Some(2));
    assert_eq!(last_two.len(), 2);
    assert_eq!(last_two[0].content, "message 3");
    assert_eq!(last_two[1].content, "message 4");

    // A limit larger than the history returns everything.
    assert_eq!(store.get_messages(&id, Some(50)).len(), 5);
}

#[test]
fn missing_conversations_read_as_empty() {
    let (_dir, store) = store();
    assert!(store.load_conversation("missing").is_none());
    assert!(store.get_messages("missing", None).is_empty());
}

#[test]
fn list_and_delete_conversations() {
    let (_dir, store) = store();
    let a = store.create_conversation().unwrap();
    let b = store.create_conversation().unwrap();

    let mut listed = store.list_conversations();
    listed.sort();
    let mut expected = vec![a.clone(), b.clone()];
    expected.sort();
    assert_eq!(listed, expected);

    assert!(store.delete_conversation(&a));
    assert!(!store.delete_conversation(&a));
    assert_eq!(store.list_conversations(), vec![b]);
}
