use notebook_cli::commands::{self, Command, FolderCommand, NoteCommand, Output};
use notebook_cli::JsonFileGateway;
use notebook_core::{
    ActionError, ActionResponse, AutoSaveConfig, Note, NoteActions, SessionAuthenticator, User,
    Workspace,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

type CliWorkspace = Workspace<JsonFileGateway, SessionAuthenticator>;

async fn workspace(dir: &Path) -> CliWorkspace {
    let gateway = JsonFileGateway::in_dir(dir).await.unwrap();
    let user = User {
        id: "alice".into(),
        name: "Alice".into(),
        email: None,
    };
    let actions = NoteActions::new(gateway, SessionAuthenticator::signed_in(user));
    let config = AutoSaveConfig {
        debounce: Duration::from_millis(20),
        saved_display: Duration::from_millis(50),
    };
    Workspace::new(Arc::new(actions), config)
}

fn note(output: Output) -> Note {
    match output {
        Output::Note(note) => note,
        other => panic!("expected a note, got {:?}", other),
    }
}

fn note_cmd(command: NoteCommand) -> Command {
    Command::Note { command }
}

fn folder_cmd(command: FolderCommand) -> Command {
    Command::Folder { command }
}

#[tokio::test]
async fn edit_goes_through_autosave_and_persists() {
    let temp = TempDir::new().unwrap();
    let ws = workspace(temp.path()).await;

    let created = note(
        commands::run(
            &ws,
            note_cmd(NoteCommand::New {
                title: None,
                description: Some("draft".into()),
                folder: None,
            }),
        )
        .await
        .unwrap(),
    );
    assert_eq!(created.title, "Untitled");

    let edited = note(
        commands::run(
            &ws,
            note_cmd(NoteCommand::Edit {
                id: created.id,
                title: Some("Plan".into()),
                description: None,
            }),
        )
        .await
        .unwrap(),
    );
    assert_eq!(edited.title, "Plan");
    assert_eq!(edited.description, "draft");
    drop(ws);

    // A fresh process sees the same record
    let ws = workspace(temp.path()).await;
    let shown = note(
        commands::run(&ws, note_cmd(NoteCommand::Show { id: created.id }))
            .await
            .unwrap(),
    );
    assert_eq!(shown, edited);
}

#[tokio::test]
async fn list_filters_by_folder() {
    let temp = TempDir::new().unwrap();
    let ws = workspace(temp.path()).await;

    let work = match commands::run(&ws, folder_cmd(FolderCommand::New { name: "Work".into() }))
        .await
        .unwrap()
    {
        Output::Folder(folder) => folder,
        other => panic!("expected a folder, got {:?}", other),
    };
    for (title, folder) in [("filed", Some(work.id)), ("loose", None)] {
        commands::run(
            &ws,
            note_cmd(NoteCommand::New {
                title: Some(title.into()),
                description: None,
                folder,
            }),
        )
        .await
        .unwrap();
    }

    let list = |folder, unfiled| {
        note_cmd(NoteCommand::List {
            folder,
            unfiled,
            since: None,
        })
    };
    let titles = |output: Output| match output {
        Output::Notes(notes) => notes.into_iter().map(|n| n.title).collect::<Vec<_>>(),
        other => panic!("expected notes, got {:?}", other),
    };

    let all = titles(commands::run(&ws, list(None, false)).await.unwrap());
    assert_eq!(all, vec!["loose", "filed"]);
    let filed = titles(commands::run(&ws, list(Some(work.id), false)).await.unwrap());
    assert_eq!(filed, vec!["filed"]);
    let unfiled = titles(commands::run(&ws, list(None, true)).await.unwrap());
    assert_eq!(unfiled, vec!["loose"]);

    commands::run(&ws, folder_cmd(FolderCommand::Rm { id: work.id }))
        .await
        .unwrap();
    let unfiled = titles(commands::run(&ws, list(None, true)).await.unwrap());
    assert_eq!(unfiled.len(), 2);
}

#[tokio::test]
async fn failures_map_to_response_kinds() {
    let temp = TempDir::new().unwrap();
    let ws = workspace(temp.path()).await;

    commands::run(&ws, folder_cmd(FolderCommand::New { name: "Work".into() }))
        .await
        .unwrap();
    let duplicate = commands::run(&ws, folder_cmd(FolderCommand::New { name: "Work".into() })).await;
    let json = serde_json::to_value(ActionResponse::from(duplicate)).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["kind"], "validation");

    let missing = commands::run(
        &ws,
        note_cmd(NoteCommand::Rm {
            id: notebook_core::NoteId::generate(),
        }),
    )
    .await;
    assert_eq!(missing.unwrap_err(), ActionError::NotFoundOrForbidden);
}

#[tokio::test]
async fn edit_with_too_long_title_reports_validation() {
    let temp = TempDir::new().unwrap();
    let ws = workspace(temp.path()).await;
    let created = note(
        commands::run(
            &ws,
            note_cmd(NoteCommand::New {
                title: Some("Plan".into()),
                description: None,
                folder: None,
            }),
        )
        .await
        .unwrap(),
    );

    let err = commands::run(
        &ws,
        note_cmd(NoteCommand::Edit {
            id: created.id,
            title: Some("x".repeat(101)),
            description: None,
        }),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), notebook_core::ErrorKind::Validation);
}

#[test]
fn render_lists_one_line_per_note() {
    let now = chrono::Utc::now();
    let make = |title: &str| Note {
        id: notebook_core::NoteId::generate(),
        title: title.into(),
        description: String::new(),
        folder_id: None,
        owner_id: "alice".into(),
        created_at: now,
        updated_at: now,
    };

    let text = commands::render(&Output::Notes(vec![make("a"), make("b")]));
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().next().unwrap().ends_with("a"));
}
