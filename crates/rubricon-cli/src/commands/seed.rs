//! The `rubricon seed` command.

use std::path::PathBuf;

use anyhow::Result;
use rubricon_core::model::{
    DiagnosticForm, Difficulty, Item, ItemChoice, ItemType, Rubric, RubricCriterion, RubricLevel,
    Stimulus, SubIndicator, User,
};
use rubricon_core::roles::Role;
use rubricon_store::Store;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = rubricon_providers::load_config_from(config_path.as_deref())?;
    let store = super::open_store(&config)?;

    match seed_demo_data(&store).await? {
        Some(counts) => {
            println!(
                "Seeded {} users, {} items, {} form(s)",
                counts.users, counts.items, counts.forms
            );
            println!("Log in with any of: jiho (student), appa (parent), mina (teacher),");
            println!("  sura (diagnostic teacher), hana (school admin), yuri (researcher), root (admin)");
            super::save_store(&store, &config).await?;
        }
        None => println!("Store already has users; nothing to do."),
    }
    Ok(())
}

pub struct SeedCounts {
    pub users: usize,
    pub items: usize,
    pub forms: usize,
}

/// Seeds demo accounts and a starter item bank. A store that already
/// has users is left untouched.
pub async fn seed_demo_data(store: &Store) -> Result<Option<SeedCounts>> {
    if !store.list_users().await.is_empty() {
        return Ok(None);
    }

    let parent = User::new("appa", "Minsu Park", Role::Parent);
    let mut student = User::new("jiho", "Jiho Park", Role::Student);
    student.parent_id = Some(parent.id);
    let users = vec![
        student,
        parent,
        User::new("mina", "Mina Choi", Role::Teacher),
        User::new("sura", "Sura Kang", Role::DiagnosticTeacher),
        User::new("hana", "Hana Lee", Role::SchoolAdmin),
        User::new("yuri", "Yuri Han", Role::Researcher),
        User::new("root", "Platform Admin", Role::Admin),
    ];
    let user_count = users.len();
    for user in users {
        store.put_user(user).await?;
    }

    for (code, name) in [
        ("inference", "Inference"),
        ("vocabulary", "Vocabulary in context"),
        ("summary", "Summarising"),
        ("argument", "Argument analysis"),
    ] {
        store
            .put_sub_indicator(SubIndicator {
                code: code.to_string(),
                name: name.to_string(),
            })
            .await;
    }

    let stimulus = Stimulus::new(
        "The Lighthouse Keeper",
        "Haru had kept the lamp at Cape Dalman for thirty years. Most evenings he \
         climbed the spiral stairs at dusk, but tonight he lit the lamp while the \
         sun still hung over the water. Far out, past the shoals, a line of dark \
         cloud was building, and the fishing boats were already running in.",
    );
    let stimulus_id = stimulus.id;
    store.put_stimulus(stimulus).await;

    let mut vocab = Item::new(
        "RC-001",
        ItemType::Mcq,
        Difficulty::Easy,
        "In the passage, 'running in' most nearly means",
        "vocabulary",
    );
    vocab.stimulus_id = Some(stimulus_id);
    vocab.choices = vec![
        choice(1, "returning to harbour", true, None),
        choice(2, "sailing quickly", false, Some(40)),
        choice(3, "racing each other", false, None),
        choice(4, "taking on water", false, None),
    ];

    let mut inference = Item::new(
        "RC-002",
        ItemType::Mcq,
        Difficulty::Medium,
        "Why does Haru light the lamp before dusk?",
        "inference",
    );
    inference.stimulus_id = Some(stimulus_id);
    inference.choices = vec![
        choice(1, "A storm is approaching", true, None),
        choice(2, "He expects a supply boat", false, Some(30)),
        choice(3, "The stairs are hard to climb in the dark", false, None),
    ];

    let mut summary = Item::new(
        "RC-003",
        ItemType::Mcq,
        Difficulty::Hard,
        "Which sentence best summarises the passage?",
        "summary",
    );
    summary.stimulus_id = Some(stimulus_id);
    summary.choices = vec![
        choice(1, "A keeper's routine changes when he reads the weather", true, None),
        choice(2, "A keeper lights a lamp at dusk every evening", false, Some(60)),
        choice(3, "Fishing boats work near a dangerous cape", false, Some(20)),
    ];

    let mut argument = Item::new(
        "CR-001",
        ItemType::Constructed,
        Difficulty::Medium,
        "Using evidence from the passage, explain how the author signals that \
         something unusual is about to happen.",
        "argument",
    );
    argument.stimulus_id = Some(stimulus_id);

    let rubric = Rubric::new(
        argument.id,
        vec![
            RubricCriterion::new(
                "evidence use",
                vec![
                    level(0, "No reference to the passage"),
                    level(1, "Mentions the passage without quoting it"),
                    level(2, "Cites one relevant detail"),
                    level(3, "Cites two or more relevant details"),
                    level(4, "Cites multiple details and links them"),
                ],
            ),
            RubricCriterion::new(
                "clarity",
                vec![
                    level(0, "Response cannot be followed"),
                    level(2, "Main point is present but underdeveloped"),
                    level(4, "Clear, ordered explanation"),
                ],
            ),
        ],
    );

    let mut items = vec![vocab, inference, summary, argument];
    let item_count = items.len();
    let mut item_ids = Vec::with_capacity(items.len());
    for item in &mut items {
        item.activate()?;
        item_ids.push(item.id);
    }
    for item in items {
        store.put_item(item).await?;
    }
    store.put_rubric(rubric).await?;

    store
        .put_form(DiagnosticForm::new("Reading Diagnostic A", item_ids))
        .await;

    Ok(Some(SeedCounts {
        users: user_count,
        items: item_count,
        forms: 1,
    }))
}

fn choice(no: u8, content: &str, correct: bool, proximity: Option<u32>) -> ItemChoice {
    let mut choice = ItemChoice::new(no, content);
    choice.is_correct = correct;
    choice.proximity_score = proximity;
    choice
}

fn level(score: u8, descriptor: &str) -> RubricLevel {
    RubricLevel {
        score,
        descriptor: descriptor.to_string(),
    }
}
