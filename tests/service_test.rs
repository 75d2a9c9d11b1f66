//! End-to-end tests: resolve, query, map, analyze

mod common;

use common::{archived_body, ChatDbFixture, Msg};
use txt_insight::contacts::ContactDirectory;
use txt_insight::error::InsightError;
use txt_insight::models::{Contact, ReactionKind, UNAVAILABLE_TEXT};
use txt_insight::service::InsightService;

fn contact(name: &str, address: &str) -> Contact {
    Contact {
        name: name.to_string(),
        canonical_address: address.to_string(),
        relationship_type: None,
        notes: None,
    }
}

fn service(db: &ChatDbFixture) -> InsightService {
    let directory = ContactDirectory::new(vec![
        contact("John Doe", "+1 (415) 555-1234"),
        contact("Jane Roe", "+1 (415) 555-0000"),
    ]);
    InsightService::new(db.config(), directory).unwrap()
}

#[test]
fn test_conversation_resolves_partial_name() {
    let db = ChatDbFixture::new();
    let john = db.handle("+14155551234");
    db.add(Msg::new(john, "hey", 3, false));
    db.add(Msg::new(john, "hey yourself", 2, true));

    let (contact, messages) = service(&db)
        .conversation("John", None, None, db.now)
        .unwrap();
    assert_eq!(contact.name, "John Doe");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "hey yourself");
    assert_eq!(messages[0].timestamp, Some(db.now - chrono::Duration::hours(2)));
}

#[test]
fn test_conversation_unknown_name() {
    let db = ChatDbFixture::new();
    let result = service(&db).conversation("Zebediah Xylophone", None, None, db.now);
    assert!(matches!(result, Err(InsightError::ContactNotFound(_))));
}

#[test]
fn test_blob_text_recovered_and_placeholder_used() {
    let db = ChatDbFixture::new();
    let john = db.handle("+14155551234");
    db.add(Msg::new(john, "", 3, false).blob_only(archived_body("Hello there")));
    db.add(Msg::new(john, "", 2, false).blob_only(vec![0x04, 0x0b, 0x00]));

    let messages = service(&db).recent_messages(Some(10)).unwrap();
    assert_eq!(messages[0].text, UNAVAILABLE_TEXT);
    assert_eq!(messages[1].text, "Hello there");
}

#[test]
fn test_group_rooms_flagged() {
    let db = ChatDbFixture::new();
    let john = db.handle("+14155551234");
    let mut msg = Msg::new(john, "group hello", 1, false);
    msg.room = Some("chat918273645".to_string());
    db.add(msg);

    let messages = service(&db).recent_messages(None).unwrap();
    assert!(messages[0].is_group_chat);
    assert_eq!(messages[0].group_id.as_deref(), Some("chat918273645"));
}

#[test]
fn test_unanswered_question_cleared_by_reply() {
    let db = ChatDbFixture::new();
    let john = db.handle("+14155551234");
    db.add(Msg::new(john, "Are you coming to dinner?", 5, false));

    let svc = service(&db);
    let report = svc.follow_ups(None, None, None, db.now).unwrap();
    assert_eq!(report.unanswered_questions.len(), 1);
    assert_eq!(report.unanswered_questions[0].address, "+14155551234");

    db.add(Msg::new(john, "yes, see you there", 1, true));
    let report = svc.follow_ups(None, None, None, db.now).unwrap();
    assert!(report.unanswered_questions.is_empty());
}

#[test]
fn test_follow_up_category_limit() {
    let db = ChatDbFixture::new();
    let john = db.handle("+14155551234");
    for hours in 1..=6 {
        db.add(Msg::new(john, "I'll call you tonight", hours, true));
    }

    let report = service(&db).follow_ups(None, None, Some(3), db.now).unwrap();
    assert_eq!(report.pending_promises.len(), 3);
    assert_eq!(report.time_sensitive.len(), 3);
    assert_eq!(report.window_days, 7);
}

#[test]
fn test_stale_threshold_cannot_exceed_window() {
    let db = ChatDbFixture::new();
    let result = service(&db).follow_ups(Some(3), Some(5), None, db.now);
    assert!(matches!(result, Err(InsightError::InvalidInput(_))));

    // A shorter window clamps the configured default threshold instead.
    assert!(service(&db).follow_ups(Some(1), None, None, db.now).is_ok());
}

#[test]
fn test_analytics_invariants() {
    let db = ChatDbFixture::new();
    let john = db.handle("+14155551234");
    let jane = db.handle("+14155550000");
    db.add(Msg::new(john, "a", 2, false));
    db.add(Msg::new(john, "b", 3, true));
    db.add(Msg::new(jane, "c", 4, false));
    db.add(Msg::new(jane, "Loved \u{201c}c\u{201d}", 4, true).reaction(2000));

    let svc = service(&db);
    let summary = svc.analytics(None, Some(7), db.now).unwrap();
    let total = summary.total_messages.unwrap();
    assert_eq!(total, 3);
    assert_eq!(summary.sent_count.unwrap() + summary.received_count.unwrap(), total);
    assert_eq!(summary.reaction_count, Some(1));
    assert_eq!(summary.avg_daily_messages, Some(0.4));
    assert_eq!(summary.busiest_day.as_deref(), Some("Monday"));
    assert_eq!(summary.top_contacts.as_ref().unwrap()[0].address, "+14155551234");

    let scoped = svc.analytics(Some("Jane"), Some(7), db.now).unwrap();
    assert_eq!(scoped.total_messages, Some(1));
    assert!(scoped.top_contacts.is_none());
}

#[test]
fn test_unread_carries_age() {
    let db = ChatDbFixture::new();
    let john = db.handle("+14155551234");
    db.add(Msg::new(john, "ping", 50, false).unread());

    let unread = service(&db).unread_messages(None, db.now).unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].days_old, Some(2));
}

#[test]
fn test_search_scoped_by_name() {
    let db = ChatDbFixture::new();
    let john = db.handle("+14155551234");
    let jane = db.handle("+14155550000");
    db.add(Msg::new(john, "lunch tomorrow?", 2, false));
    db.add(Msg::new(jane, "lunch was great", 1, false));

    let svc = service(&db);
    assert_eq!(svc.search("lunch", None, None).unwrap().len(), 2);
    let johns = svc.search("lunch", Some("John"), None).unwrap();
    assert_eq!(johns.len(), 1);
    assert_eq!(johns[0].text, "lunch tomorrow?");
}

#[test]
fn test_limit_validation() {
    let db = ChatDbFixture::new();
    let result = service(&db).recent_messages(Some(0));
    assert!(matches!(result, Err(InsightError::InvalidInput(_))));
}

#[test]
fn test_missing_store_is_terminal() {
    let db = ChatDbFixture::new();
    let mut config = db.config();
    config.store.database_path = db.path.with_file_name("gone.db").display().to_string();
    let svc = InsightService::new(config, ContactDirectory::default()).unwrap();

    let err = svc.analytics(None, None, db.now).unwrap_err();
    assert!(matches!(err, InsightError::StoreUnavailable(_)));
    assert!(err.is_terminal());
}

#[test]
fn test_reply_in_group_answers_group_question() {
    let db = ChatDbFixture::new();
    let jane = db.handle("+14155550000");
    db.add(Msg::new(jane, "Where should we meet?", 3, false).in_room("chat123"));

    let svc = service(&db);
    let report = svc.follow_ups(None, None, None, db.now).unwrap();
    assert_eq!(report.unanswered_questions.len(), 1);
    assert_eq!(report.unanswered_questions[0].address, "+14155550000");
    assert_eq!(report.unanswered_questions[0].group_id.as_deref(), Some("chat123"));

    db.add(Msg::mine_in_room("chat123", "At the park", 2));
    let report = svc.follow_ups(None, None, None, db.now).unwrap();
    assert!(report.unanswered_questions.is_empty());
}

#[test]
fn test_non_database_file_is_unavailable() {
    let db = ChatDbFixture::new();
    let bogus = db.path.with_file_name("notes.txt");
    std::fs::write(&bogus, "these are not the messages you are looking for\n".repeat(40)).unwrap();
    let mut config = db.config();
    config.store.database_path = bogus.display().to_string();
    let svc = InsightService::new(config, ContactDirectory::default()).unwrap();

    let err = svc.analytics(None, None, db.now).unwrap_err();
    assert!(matches!(err, InsightError::StoreUnavailable(_)));
    assert!(matches!(
        svc.follow_ups(None, None, None, db.now),
        Err(InsightError::StoreUnavailable(_))
    ));
    assert!(matches!(svc.check_store(), Err(InsightError::StoreUnavailable(_))));
}

#[test]
fn test_group_listing_and_participant_lookup() {
    let db = ChatDbFixture::new();
    let john = db.handle("+14155551234");
    let jane = db.handle("+14155550000");
    let group = db.group("chat123", None, &[jane, john]);
    let asked = db.add(Msg::new(jane, "Where should we meet?", 3, false).in_room("chat123"));
    db.join_chat(group, asked);
    let replied = db.add(Msg::mine_in_room("chat123", "At the park", 2));
    db.join_chat(group, replied);

    let svc = service(&db);
    let groups = svc.group_chats(None).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].group_id, "chat123");
    assert_eq!(groups[0].participants, vec!["+14155550000", "+14155551234"]);
    assert_eq!(groups[0].last_message_date, Some(db.now - chrono::Duration::hours(2)));

    let from_jane = svc.group_messages(None, Some("Jane"), None).unwrap();
    assert_eq!(from_jane.len(), 1);
    assert!(from_jane[0].is_group_chat);

    let whole_room = svc.group_messages(Some("chat123"), None, None).unwrap();
    assert_eq!(whole_room.len(), 2);
    assert!(whole_room[0].is_from_me);
    assert_eq!(whole_room[0].group_id.as_deref(), Some("chat123"));
}

#[test]
fn test_attachments_and_reactions_mapped() {
    let db = ChatDbFixture::new();
    let john = db.handle("+14155551234");
    let photo = db.add(Msg::new(john, "look", 3, false));
    db.attach_file(photo, "IMG_0001.heic", "image/heic", 2048);
    db.add(Msg::new(john, "Loved an image", 2, true).tapback(2000, photo));

    let svc = service(&db);
    let attachments = svc.attachments(Some("John"), Some("image/"), None).unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].total_bytes, 2048);
    assert_eq!(attachments[0].sender_address, "+14155551234");

    let reactions = svc.reactions(Some("John"), None).unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0].kind, ReactionKind::Loved);
    assert!(!reactions[0].removed);
    assert!(reactions[0].is_from_me);
    assert_eq!(reactions[0].target_preview, "look");
}

#[test]
fn test_links_extracted_and_capped() {
    let db = ChatDbFixture::new();
    let john = db.handle("+14155551234");
    db.add(Msg::new(john, "menu: https://example.com/menu, or https://example.org.", 2, false));
    db.add(Msg::new(john, "no links", 1, false));

    let svc = service(&db);
    let links = svc.links(None, None, None, db.now).unwrap();
    let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(urls, vec!["https://example.com/menu", "https://example.org"]);
    assert_eq!(svc.links(Some("John"), Some(7), Some(1), db.now).unwrap().len(), 1);
}

#[test]
fn test_unknown_senders_skip_contacts() {
    let db = ChatDbFixture::new();
    let john = db.handle("+14155551234");
    let stranger = db.handle("+14155559999");
    db.add(Msg::new(john, "hi, it's John", 1, false));
    for (hours, text) in [(5, "hello?"), (4, "is this Sam"), (3, "wrong number maybe")] {
        db.add(Msg::new(stranger, text, hours, false));
    }

    let svc = service(&db);
    let handles = svc.handles(None, None, db.now).unwrap();
    assert_eq!(handles.len(), 2);
    assert_eq!(handles[0].address, "+14155551234");

    let unknown = svc.unknown_senders(None, None, db.now).unwrap();
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0].activity.address, "+14155559999");
    assert_eq!(unknown[0].activity.message_count, 3);
    let samples: Vec<_> = unknown[0].samples.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(samples, vec!["wrong number maybe", "is this Sam"]);
}
