use async_trait::async_trait;
use notebook_core::{
    ActionResult, AutoSaveConfig, EditorEvent, ErrorKind, FolderFilter, InMemoryGateway, NewNote,
    Note, NoteActions, NoteContent, NotePatch, SaveRequest, SaveScheduler, SaveStatus, SaveTarget,
    SessionAuthenticator, User, Workspace,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Actions = NoteActions<Arc<InMemoryGateway>, SessionAuthenticator>;

/// Records every write before passing it on, optionally after a delay.
struct Recorder {
    actions: Arc<Actions>,
    latency: Duration,
    requests: Mutex<Vec<SaveRequest>>,
}

impl Recorder {
    fn new(actions: Arc<Actions>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            actions,
            latency,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<SaveRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SaveTarget for Recorder {
    async fn save(&self, request: SaveRequest) -> ActionResult<Note> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.actions.save(request).await
    }
}

fn actions() -> Arc<Actions> {
    let user = User {
        id: "alice".into(),
        name: "Alice".into(),
        email: None,
    };
    Arc::new(NoteActions::new(
        Arc::new(InMemoryGateway::new()),
        SessionAuthenticator::signed_in(user),
    ))
}

async fn note(actions: &Actions, title: &str, description: &str) -> Note {
    actions
        .create_note(NewNote {
            title: Some(title.into()),
            description: Some(description.into()),
            folder_id: None,
        })
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn edits_within_the_window_produce_one_write() {
    let actions = actions();
    let n = note(&actions, "", "").await;
    let recorder = Recorder::new(actions.clone(), Duration::ZERO);
    let editor = SaveScheduler::new(recorder.clone(), AutoSaveConfig::default());
    editor.open(&n);

    for text in ["P", "Pl", "Pla", "Plan"] {
        editor.schedule(NoteContent::new(text, ""));
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert!(recorder.requests().is_empty());

    assert_eq!(editor.wait_settled().await, SaveStatus::Saved);
    let requests = recorder.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].patch, NotePatch::title("Plan"));
    assert_eq!(requests[0].last_known_updated_at, Some(n.updated_at));
}

#[tokio::test(start_paused = true)]
async fn title_then_description_is_sent_as_one_write() {
    let actions = actions();
    let n = note(&actions, "", "").await;
    let recorder = Recorder::new(actions.clone(), Duration::ZERO);
    let editor = SaveScheduler::new(recorder.clone(), AutoSaveConfig::default());
    editor.open(&n);

    editor.schedule(NoteContent::new("Plan", ""));
    tokio::time::sleep(Duration::from_millis(300)).await;
    editor.schedule(NoteContent::new("Plan", "Q1 goals"));
    editor.wait_settled().await;

    let requests = recorder.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].patch.title.as_deref(), Some("Plan"));
    assert_eq!(requests[0].patch.description.as_deref(), Some("Q1 goals"));

    let stored = actions.get_note(n.id).await.unwrap();
    assert_eq!(stored.title, "Plan");
    assert_eq!(stored.description, "Q1 goals");
}

#[tokio::test(start_paused = true)]
async fn pending_timer_never_writes_to_the_next_note() {
    let actions = actions();
    let a = note(&actions, "A", "alpha").await;
    let b = note(&actions, "B", "beta").await;
    let recorder = Recorder::new(actions.clone(), Duration::ZERO);
    let editor = SaveScheduler::new(recorder.clone(), AutoSaveConfig::default());

    editor.open(&a);
    editor.schedule(NoteContent::new("A edited", "alpha"));
    tokio::time::sleep(Duration::from_millis(300)).await;
    editor.open(&b);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(recorder.requests().is_empty());
    assert_eq!(editor.status(), SaveStatus::Idle);
    assert_eq!(actions.get_note(a.id).await.unwrap().title, "A");
    assert_eq!(actions.get_note(b.id).await.unwrap().title, "B");
}

#[tokio::test(start_paused = true)]
async fn late_response_for_previous_note_is_discarded() {
    let actions = actions();
    let a = note(&actions, "A", "").await;
    let b = note(&actions, "B", "").await;
    let recorder = Recorder::new(actions.clone(), Duration::from_millis(500));
    let editor = SaveScheduler::new(recorder.clone(), AutoSaveConfig::default());

    let discarded = Arc::new(Mutex::new(Vec::new()));
    let discarded_clone = Arc::clone(&discarded);
    let _sub = editor.events().subscribe(move |event| {
        if let EditorEvent::SaveDiscarded { note_id } = event {
            discarded_clone.lock().unwrap().push(*note_id);
        }
    });

    editor.open(&a);
    editor.schedule(NoteContent::new("A edited", ""));
    // Timer fires at 600 ms, response arrives at 1100 ms
    tokio::time::sleep(Duration::from_millis(800)).await;
    editor.open(&b);
    tokio::time::sleep(Duration::from_secs(1)).await;

    // The write itself completed
    assert_eq!(actions.get_note(a.id).await.unwrap().title, "A edited");
    // but the editor for B never saw it
    assert_eq!(*discarded.lock().unwrap(), vec![a.id]);
    assert_eq!(editor.snapshot().unwrap().content, NoteContent::new("B", ""));
    assert_eq!(editor.status(), SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn conflicting_write_is_refused_and_buffer_kept() {
    let actions = actions();
    let n = note(&actions, "Plan", "v1").await;
    let recorder = Recorder::new(actions.clone(), Duration::ZERO);
    let editor = SaveScheduler::new(recorder.clone(), AutoSaveConfig::default());
    editor.open(&n);

    let failures = Arc::new(Mutex::new(Vec::new()));
    let failures_clone = Arc::clone(&failures);
    let _sub = editor.events().subscribe(move |event| {
        if let EditorEvent::SaveFailed { kind, message, .. } = event {
            failures_clone.lock().unwrap().push((*kind, message.clone()));
        }
    });

    // Another session writes first
    actions
        .update_note(n.id, NotePatch::description("v2 from elsewhere"))
        .await
        .unwrap();

    editor.schedule(NoteContent::new("Plan", "v2 from here"));
    assert_eq!(editor.wait_settled().await, SaveStatus::Error);

    let stored = actions.get_note(n.id).await.unwrap();
    assert_eq!(stored.description, "v2 from elsewhere");
    assert_eq!(editor.buffer().unwrap().description, "v2 from here");
    assert_eq!(editor.snapshot().unwrap().updated_at, Some(n.updated_at));

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, ErrorKind::Conflict);
    assert!(failures[0].1.starts_with("CONFLICT"));
}

#[tokio::test(start_paused = true)]
async fn editing_title_never_overwrites_description() {
    let actions = actions();
    let n = note(&actions, "Plan", "mine").await;
    let recorder = Recorder::new(actions.clone(), Duration::ZERO);
    let editor = SaveScheduler::new(recorder.clone(), AutoSaveConfig::default());
    editor.open(&n);

    editor.schedule(NoteContent::new("Plan v2", "mine"));
    editor.wait_settled().await;

    let requests = recorder.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].patch.description, None);
}

#[tokio::test(start_paused = true)]
async fn edit_during_write_is_saved_after_it() {
    let actions = actions();
    let n = note(&actions, "", "").await;
    let recorder = Recorder::new(actions.clone(), Duration::from_millis(400));
    let editor = SaveScheduler::new(recorder.clone(), AutoSaveConfig::default());
    editor.open(&n);

    editor.schedule(NoteContent::new("Plan", ""));
    // First write is in flight between 600 ms and 1000 ms
    tokio::time::sleep(Duration::from_millis(700)).await;
    editor.schedule(NoteContent::new("Plan", "Q1 goals"));
    assert_eq!(editor.status(), SaveStatus::Saving);

    assert_eq!(editor.wait_settled().await, SaveStatus::Saved);

    let requests = recorder.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].patch, NotePatch::description("Q1 goals"));
    // The second write was checked against the first one's timestamp
    assert_ne!(requests[1].last_known_updated_at, requests[0].last_known_updated_at);

    let stored = actions.get_note(n.id).await.unwrap();
    assert_eq!(stored.title, "Plan");
    assert_eq!(stored.description, "Q1 goals");
}

#[tokio::test(start_paused = true)]
async fn edit_reverted_during_write_is_skipped_at_flush() {
    let actions = actions();
    let n = note(&actions, "", "").await;
    let recorder = Recorder::new(actions.clone(), Duration::from_millis(400));
    let editor = SaveScheduler::new(recorder.clone(), AutoSaveConfig::default());
    editor.open(&n);

    let skipped = Arc::new(Mutex::new(Vec::new()));
    let skipped_clone = Arc::clone(&skipped);
    let _sub = editor.events().subscribe(move |event| {
        if let EditorEvent::SaveSkipped { note_id } = event {
            skipped_clone.lock().unwrap().push(*note_id);
        }
    });

    editor.schedule(NoteContent::new("Plan", ""));
    // The write of "Plan" is in flight between 600 ms and 1000 ms
    tokio::time::sleep(Duration::from_millis(700)).await;
    editor.schedule(NoteContent::new("Plan!", ""));
    tokio::time::sleep(Duration::from_millis(50)).await;
    editor.schedule(NoteContent::new("Plan", ""));
    assert_eq!(editor.status(), SaveStatus::Saving);

    // The second timer fires after the first write confirmed "Plan"
    assert_eq!(editor.wait_settled().await, SaveStatus::Idle);

    assert_eq!(recorder.requests().len(), 1);
    assert_eq!(*skipped.lock().unwrap(), vec![n.id]);
    assert_eq!(actions.get_note(n.id).await.unwrap().title, "Plan");

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(recorder.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_title_is_stored_as_default_without_resaving() {
    let actions = actions();
    let n = note(&actions, "Draft", "").await;
    let recorder = Recorder::new(actions.clone(), Duration::ZERO);
    let editor = SaveScheduler::new(recorder.clone(), AutoSaveConfig::default());
    editor.open(&n);

    editor.schedule(NoteContent::new("", ""));
    editor.wait_settled().await;

    assert_eq!(actions.get_note(n.id).await.unwrap().title, "Untitled");
    // The snapshot keeps what was typed, so the same buffer is not dirty
    editor.schedule(NoteContent::new("", ""));
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(recorder.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn saved_status_returns_to_idle() {
    let actions = actions();
    let n = note(&actions, "", "").await;
    let editor = SaveScheduler::new(actions.clone(), AutoSaveConfig::default());
    editor.open(&n);

    let mut rx = editor.subscribe_status();
    editor.schedule(NoteContent::new("Plan", ""));
    assert_eq!(*rx.borrow_and_update(), SaveStatus::Saving);

    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), SaveStatus::Saved);

    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn notebook_scenario() {
    let actions = actions();
    let ws = Workspace::new(actions.clone(), AutoSaveConfig::default());

    let n = ws.create_note(NewNote::default()).await.unwrap();
    assert_eq!(n.title, "Untitled");

    ws.edit(NoteContent::new("Plan", ""));
    tokio::time::sleep(Duration::from_millis(300)).await;
    ws.edit(NoteContent::new("Plan", "Q1 goals"));
    assert_eq!(ws.wait_settled().await, SaveStatus::Saved);

    let stored = actions.get_note(n.id).await.unwrap();
    assert_eq!((stored.title.as_str(), stored.description.as_str()), ("Plan", "Q1 goals"));

    let work = ws.create_folder("Work").await.unwrap();
    assert_eq!(ws.rename_folder(work.id, "Work").await.unwrap().name, "Work");

    ws.move_note(n.id, Some(work.id)).await.unwrap();
    let other = ws
        .create_note(NewNote {
            title: Some("Other".into()),
            folder_id: Some(work.id),
            ..Default::default()
        })
        .await
        .unwrap();
    ws.select_folder(FolderFilter::Folder(work.id));
    assert_eq!(ws.state().visible_notes().count(), 2);

    ws.delete_folder(work.id).await.unwrap();

    assert!(actions.list_folders().await.unwrap().is_empty());
    for id in [n.id, other.id] {
        assert!(actions.get_note(id).await.unwrap().is_unfiled());
    }
    assert_eq!(ws.state().visible_notes().count(), 2);
}
