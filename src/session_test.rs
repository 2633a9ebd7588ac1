use super::*;
use crate::consultation::SimpleReport;
use crate::conversation::{ConversationState, Role, StaleReplyPolicy};
use crate::imaging::ImageSource;
use crate::test_helpers::png_bytes;
use crate::transport::TransportError;
use std::sync::Mutex;
use std::time::Duration;

// =========================================================================
// MockApi
// =========================================================================

type Outcome = Result<ConsultationReply, ConsultError>;

struct MockApi {
    outcomes: Mutex<Vec<Outcome>>,
    requests: Mutex<Vec<(ConsultationRequest, ConsultationMode)>>,
}

impl MockApi {
    fn new(outcomes: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self { outcomes: Mutex::new(outcomes), requests: Mutex::new(Vec::new()) })
    }

    fn requests(&self) -> Vec<(ConsultationRequest, ConsultationMode)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ConsultationApi for MockApi {
    async fn submit(&self, request: &ConsultationRequest, mode: ConsultationMode) -> Outcome {
        self.requests.lock().unwrap().push((request.clone(), mode));
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() { Ok(simple("done")) } else { outcomes.remove(0) }
    }
}

fn simple(text: &str) -> ConsultationReply {
    ConsultationReply::Simple {
        consultation_id: None,
        report: SimpleReport { text: text.to_owned(), timestamp: "2024-01-01T00:00:00Z".to_owned() },
    }
}

fn session_with(api: &Arc<MockApi>, config: &ClientConfig) -> ChatSession {
    let api: Arc<dyn ConsultationApi> = api.clone();
    ChatSession::new(api, config)
}

// =========================================================================
// send
// =========================================================================

#[tokio::test]
async fn send_builds_request_and_appends_reply() {
    let api = MockApi::new(vec![Ok(simple("Could be a cold; watch for discharge."))]);
    let mut session = session_with(&api, &ClientConfig::default());
    session.set_category(ConsultationType::Health);

    let reply = session.send("my cat is sneezing").await.unwrap();
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, "Could be a cold; watch for discharge.");

    let roles: Vec<Role> = session.conversation().messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
    assert!(!session.conversation().is_awaiting());

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    let (request, mode) = &requests[0];
    assert_eq!(*mode, ConsultationMode::Simple);
    assert_eq!(request.consultation_type, ConsultationType::Health);
    assert_eq!(request.additional_notes.as_deref(), Some("my cat is sneezing"));
    assert!(request.image_base64.is_none());
}

#[tokio::test]
async fn blank_send_never_reaches_api() {
    let api = MockApi::new(vec![]);
    let mut session = session_with(&api, &ClientConfig::default());
    assert!(session.send("   ").await.is_none());
    assert!(api.requests().is_empty());
    assert!(session.conversation().messages().is_empty());
}

#[tokio::test]
async fn business_error_becomes_one_assistant_message() {
    let api = MockApi::new(vec![Err(ConsultError::Business("rate limited".into()))]);
    let mut session = session_with(&api, &ClientConfig::default());

    let reply = session.send("hello").await.unwrap();
    assert!(reply.content.contains("rate limited"));
    assert_eq!(session.conversation().messages().len(), 2);
    assert_eq!(session.conversation().state(), ConversationState::Idle);
}

#[tokio::test]
async fn timeout_clears_in_flight_flag() {
    let api = MockApi::new(vec![Err(TransportError::Timeout(Duration::from_secs(60)).into())]);
    let mut session = session_with(&api, &ClientConfig::default());

    let reply = session.send("anyone?").await.unwrap();
    assert!(reply.content.contains("timed out"));
    assert!(!session.conversation().is_awaiting());

    assert!(session.send("again").await.is_some());
    assert_eq!(api.requests().len(), 2);
}

#[tokio::test]
async fn mode_and_cat_profile_are_forwarded() {
    let api = MockApi::new(vec![]);
    let mut session = session_with(&api, &ClientConfig::default());
    session.set_mode(ConsultationMode::Workflow);
    session.set_cat_profile(CatProfile { cat_name: Some("Mochi".into()), age: Some(3.0), ..CatProfile::default() });

    session.send("checkup").await.unwrap();
    let (request, mode) = api.requests().remove(0);
    assert_eq!(mode, ConsultationMode::Workflow);
    assert_eq!(request.cat.cat_name.as_deref(), Some("Mochi"));
    assert_eq!(request.cat.age, Some(3.0));
}

// =========================================================================
// images
// =========================================================================

#[tokio::test]
async fn staged_image_is_sent_as_data_url() {
    let api = MockApi::new(vec![]);
    let mut session = session_with(&api, &ClientConfig::default());
    let file = ImageFile::from_bytes("cat.png", "image/png", png_bytes(8, 8));
    session.conversation_mut().stage_image(file).unwrap();

    session.send("").await.unwrap();
    let (request, _) = api.requests().remove(0);
    assert!(request.image_base64.unwrap().starts_with("data:image/png;base64,"));
    assert_eq!(request.additional_notes.as_deref(), Some("(sent an image)"));
    assert!(session.conversation().staged_image().is_none());
}

#[tokio::test]
async fn compression_sends_jpeg() {
    let api = MockApi::new(vec![]);
    let config = ClientConfig {
        compression: Some(CompressionSettings { max_width: 4, max_height: 4, quality: 70 }),
        ..ClientConfig::default()
    };
    let mut session = session_with(&api, &config);
    let file = ImageFile::from_bytes("big.png", "image/png", png_bytes(16, 8));
    session.conversation_mut().stage_image(file).unwrap();

    session.send("look").await.unwrap();
    let (request, _) = api.requests().remove(0);
    assert!(request.image_base64.unwrap().starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn unreadable_image_folds_into_reply_without_calling_api() {
    let api = MockApi::new(vec![]);
    let mut session = session_with(&api, &ClientConfig::default());
    let file = ImageFile {
        name: "gone.png".into(),
        mime: "image/png".into(),
        size: 10,
        source: ImageSource::Path(std::env::temp_dir().join("cat-consult-missing-image.png")),
    };
    session.conversation_mut().stage_image(file).unwrap();

    let reply = session.send("see photo").await.unwrap();
    assert!(reply.content.starts_with("Sorry, something went wrong"));
    assert!(reply.content.contains("gone.png") || reply.content.contains("cat-consult-missing-image"));
    assert!(api.requests().is_empty());
    assert!(!session.conversation().is_awaiting());
}

#[tokio::test]
async fn attach_image_rejects_unsupported_extension() {
    let dir = std::env::temp_dir().join(format!("cat-consult-session-{}", uuid::Uuid::now_v7()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let gif = dir.join("anim.gif");
    tokio::fs::write(&gif, b"GIF89a").await.unwrap();
    let png = dir.join("ok.png");
    tokio::fs::write(&png, png_bytes(2, 2)).await.unwrap();

    let api = MockApi::new(vec![]);
    let mut session = session_with(&api, &ClientConfig::default());
    session.attach_image(&png).await.unwrap();
    let err = session.attach_image(&gif).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(session.conversation().staged_image().map(|f| f.name.as_str()), Some("ok.png"));

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

// =========================================================================
// split round trip
// =========================================================================

#[tokio::test]
async fn clear_while_dispatched_respects_stale_policy() {
    let api = MockApi::new(vec![Ok(simple("late answer"))]);
    let config = ClientConfig { stale_replies: StaleReplyPolicy::Discard, ..ClientConfig::default() };
    let mut session = session_with(&api, &config);

    let dispatcher = session.dispatcher();
    let pending = session.conversation_mut().submit("slow question").unwrap();
    let task = tokio::spawn(async move {
        let outcome = dispatcher.run(&pending).await;
        (pending, outcome)
    });

    session.clear();
    assert!(session.conversation().is_awaiting());

    let (pending, outcome) = task.await.unwrap();
    assert!(session.conversation_mut().resolve(pending, outcome).is_none());
    assert!(session.conversation().messages().is_empty());
    assert!(!session.conversation().is_awaiting());
}
