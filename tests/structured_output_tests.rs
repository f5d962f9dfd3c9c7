//! Protocol tests for structured output acquisition.
//!
//! These drive `ChatSession` against a scripted gateway and verify the
//! request/recovery protocol end to end: attempt counting, backoff timing,
//! failure classification, and message-log bookkeeping.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;

use structchat::{
    Attachment, ChatSession, DomainError, Role, ScriptedChatClient, ScriptedReply,
};

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
struct ContactCard {
    name: String,
    email: String,
    age: u32,
}

const VALID_REPLY: &str = r#"{"name": "Ada", "email": "ada@example.com", "age": 36}"#;
const MALFORMED_REPLY: &str = "Sure! Here is the JSON you asked for:";
const WRONG_TYPE_REPLY: &str = r#"{"name": "Ada", "email": "ada@example.com", "age": "old"}"#;

fn session_over(client: &Arc<ScriptedChatClient>) -> ChatSession {
    ChatSession::new(client.clone(), "test-model")
}

#[tokio::test]
async fn first_attempt_success_makes_a_single_call() {
    let client = Arc::new(ScriptedChatClient::with_replies(vec![ScriptedReply::text(
        VALID_REPLY,
    )]));
    let mut session = session_over(&client);

    let card: ContactCard = session
        .ask_structured("extract the contact", None)
        .await
        .expect("valid reply must parse");

    assert_eq!(card.name, "Ada");
    assert_eq!(card.age, 36);
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn recovers_on_third_attempt_after_two_failures() {
    let client = Arc::new(ScriptedChatClient::with_replies(vec![
        ScriptedReply::text(MALFORMED_REPLY),
        ScriptedReply::text(WRONG_TYPE_REPLY),
        ScriptedReply::text(VALID_REPLY),
    ]));
    let mut session = session_over(&client);

    let card: ContactCard = session
        .ask_structured("extract the contact", None)
        .await
        .expect("third attempt should succeed");

    assert_eq!(card.email, "ada@example.com");
    assert_eq!(client.call_count(), 3, "exactly three total attempts");
}

#[tokio::test]
async fn recovery_turns_carry_schema_and_failure_reason() {
    let client = Arc::new(ScriptedChatClient::with_replies(vec![
        ScriptedReply::text(MALFORMED_REPLY),
        ScriptedReply::text(VALID_REPLY),
    ]));
    let mut session = session_over(&client);

    let _: ContactCard = session
        .ask_structured("extract the contact", None)
        .await
        .unwrap();

    let calls = client.recorded_calls();
    assert_eq!(calls.len(), 2);

    // The recovery call replays the failed exchange and ends with the
    // recovery directive naming the concrete failure and the schema.
    let recovery = &calls[1];
    let directive = recovery.messages.last().expect("recovery turn");
    assert_eq!(directive.role(), Role::User);
    assert!(directive.content().contains("Decode error"));
    assert!(directive.content().contains("email"), "schema must be embedded");

    let replayed: Vec<&str> = recovery
        .messages
        .iter()
        .map(|m| m.content())
        .collect();
    assert!(replayed.contains(&"extract the contact"));
    assert!(replayed.contains(&MALFORMED_REPLY));
}

#[tokio::test]
async fn exhaustion_after_three_attempts_carries_decode_kind() {
    let client = Arc::new(ScriptedChatClient::with_replies(vec![
        ScriptedReply::text(MALFORMED_REPLY),
        ScriptedReply::text(MALFORMED_REPLY),
        ScriptedReply::text(MALFORMED_REPLY),
    ]));
    let mut session = session_over(&client);

    let err = session
        .ask_structured::<ContactCard>("extract the contact", None)
        .await
        .unwrap_err();

    assert_eq!(client.call_count(), 3);
    match err {
        DomainError::Exhausted {
            attempts,
            last_failure,
        } => {
            assert_eq!(attempts, 3);
            assert!(last_failure.is_decode());
        }
        other => panic!("expected Exhausted, got {other}"),
    }
}

#[tokio::test]
async fn exhaustion_distinguishes_persistent_validation_failure() {
    let client = Arc::new(ScriptedChatClient::with_replies(vec![
        ScriptedReply::text(WRONG_TYPE_REPLY),
        ScriptedReply::text(WRONG_TYPE_REPLY),
        ScriptedReply::text(WRONG_TYPE_REPLY),
    ]));
    let mut session = session_over(&client);

    let err = session
        .ask_structured::<ContactCard>("extract the contact", None)
        .await
        .unwrap_err();

    match err {
        DomainError::Exhausted { last_failure, .. } => assert!(last_failure.is_validation()),
        other => panic!("expected Exhausted, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn backoff_waits_one_then_two_seconds() {
    let client = Arc::new(ScriptedChatClient::with_replies(vec![
        ScriptedReply::text(MALFORMED_REPLY),
        ScriptedReply::text(MALFORMED_REPLY),
        ScriptedReply::text(VALID_REPLY),
    ]));
    let mut session = session_over(&client);

    let start = tokio::time::Instant::now();
    let _: ContactCard = session
        .ask_structured("extract the contact", None)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    // 1 s before attempt 2, 2 s before attempt 3; the first attempt runs
    // immediately.
    assert!(elapsed >= std::time::Duration::from_secs(3));
    assert!(elapsed < std::time::Duration::from_secs(4));
}

#[tokio::test]
async fn transport_error_during_recovery_aborts_immediately() {
    let client = Arc::new(ScriptedChatClient::with_replies(vec![
        ScriptedReply::text(MALFORMED_REPLY),
        ScriptedReply::transport_error("connection reset"),
        ScriptedReply::text(VALID_REPLY),
    ]));
    let mut session = session_over(&client);

    let err = session
        .ask_structured::<ContactCard>("extract the contact", None)
        .await
        .unwrap_err();

    assert!(err.is_transport(), "transport failures are never retried");
    assert_eq!(client.call_count(), 2, "no third attempt after abort");
}

#[tokio::test]
async fn transport_error_on_first_call_propagates() {
    let client = Arc::new(ScriptedChatClient::with_replies(vec![
        ScriptedReply::transport_error("dns failure"),
    ]));
    let mut session = session_over(&client);

    let err = session
        .ask_structured::<ContactCard>("extract the contact", None)
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn untracked_log_is_restored_across_sequential_requests() {
    let client = Arc::new(ScriptedChatClient::with_replies(vec![
        ScriptedReply::text(VALID_REPLY),
        ScriptedReply::text(MALFORMED_REPLY),
        ScriptedReply::text(MALFORMED_REPLY),
        ScriptedReply::text(MALFORMED_REPLY),
        ScriptedReply::text(VALID_REPLY),
    ]));
    let mut session = session_over(&client);

    // Success, exhaustion, success: the log never grows beyond the system turn.
    let _: ContactCard = session.ask_structured("first", None).await.unwrap();
    assert_eq!(session.log().len(), 1);

    let _ = session
        .ask_structured::<ContactCard>("second", None)
        .await
        .unwrap_err();
    assert_eq!(session.log().len(), 1);

    let _: ContactCard = session.ask_structured("third", None).await.unwrap();
    assert_eq!(session.log().len(), 1);
    assert_eq!(session.log().turns()[0].role(), Role::System);
}

#[tokio::test]
async fn tracked_session_appends_one_exchange_per_successful_request() {
    let client = Arc::new(ScriptedChatClient::with_replies(vec![
        ScriptedReply::text(VALID_REPLY),
        ScriptedReply::text(VALID_REPLY),
    ]));
    let mut session = session_over(&client).with_history_tracking(true);
    assert!(session.is_tracking_history());

    let _: ContactCard = session.ask_structured("first", None).await.unwrap();
    let _: ContactCard = session.ask_structured("second", None).await.unwrap();

    let roles: Vec<Role> = session.log().turns().iter().map(|t| t.role()).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
        ]
    );
    assert_eq!(session.log().turns()[1].content(), "first");
    assert_eq!(session.log().turns()[3].content(), "second");
}

#[tokio::test]
async fn system_turn_is_recomputed_per_structured_request() {
    let client = Arc::new(ScriptedChatClient::with_replies(vec![ScriptedReply::text(
        VALID_REPLY,
    )]));
    let mut session = session_over(&client).with_instruction("You extract contacts.");

    let _: ContactCard = session.ask_structured("extract", None).await.unwrap();

    let system = session.log().system_instruction();
    assert!(system.starts_with("You extract contacts."));
    assert!(system.contains("email"), "schema description embedded");

    let sent = &client.recorded_calls()[0].messages[0];
    assert_eq!(sent.role(), Role::System);
    assert_eq!(sent.content(), system);
}

#[tokio::test]
async fn attachment_is_replayed_in_recovery_exchange() {
    let client = Arc::new(ScriptedChatClient::with_replies(vec![
        ScriptedReply::text(MALFORMED_REPLY),
        ScriptedReply::text(VALID_REPLY),
    ]));
    let mut session = session_over(&client);

    let attachment = Attachment::bytes(vec![1, 2, 3]);
    let _: ContactCard = session
        .ask_structured("who is on this badge?", Some(attachment.clone()))
        .await
        .unwrap();

    let calls = client.recorded_calls();
    let initial_user = &calls[0].messages[1];
    assert_eq!(initial_user.attachment(), Some(&attachment));

    let replayed_user = calls[1]
        .messages
        .iter()
        .find(|m| m.content() == "who is on this badge?")
        .expect("failed exchange replayed in recovery");
    assert_eq!(replayed_user.attachment(), Some(&attachment));
}
