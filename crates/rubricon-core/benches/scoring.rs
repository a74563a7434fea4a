use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rubricon_core::model::{
    Difficulty, Item, ItemChoice, ItemType, Response, ResponseRubricScore, Rubric,
    RubricCriterion, RubricLevel, ScoreState, StudentAttempt,
};
use rubricon_core::scoring::{score_constructed, score_mcq};
use rubricon_core::summary::{summarize_attempt, ItemResponse};
use uuid::Uuid;

fn make_mcq(code: &str, area: &str) -> Item {
    let mut item = Item::new(code, ItemType::Mcq, Difficulty::Medium, "Which?", area);
    let mut correct = ItemChoice::new(1, "right");
    correct.is_correct = true;
    let mut near = ItemChoice::new(2, "close");
    near.proximity_score = Some(60);
    item.choices = vec![correct, near, ItemChoice::new(3, "wrong"), ItemChoice::new(4, "off")];
    item
}

fn make_rubric(criteria: usize) -> Rubric {
    let levels: Vec<RubricLevel> = (0..=4)
        .map(|score| RubricLevel {
            score,
            descriptor: format!("level {score}"),
        })
        .collect();
    Rubric::new(
        Uuid::new_v4(),
        (0..criteria)
            .map(|n| RubricCriterion::new(format!("criterion {n}"), levels.clone()))
            .collect(),
    )
}

fn bench_score_mcq(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_mcq");
    let item = make_mcq("RC-001", "inference");

    group.bench_function("correct", |b| {
        let mut response = Response::new(Uuid::new_v4(), item.id);
        response.selected_choice_id = Some(item.choices[0].id);
        b.iter(|| score_mcq(black_box(&item), black_box(&response)))
    });

    group.bench_function("proximity", |b| {
        let mut response = Response::new(Uuid::new_v4(), item.id);
        response.selected_choice_id = Some(item.choices[1].id);
        b.iter(|| score_mcq(black_box(&item), black_box(&response)))
    });

    group.bench_function("unanswered", |b| {
        let response = Response::new(Uuid::new_v4(), item.id);
        b.iter(|| score_mcq(black_box(&item), black_box(&response)))
    });

    group.finish();
}

fn bench_score_constructed(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_constructed");

    for criteria in [2usize, 6, 12] {
        let rubric = make_rubric(criteria);
        let response_id = Uuid::new_v4();
        let rows: Vec<ResponseRubricScore> = rubric
            .criteria
            .iter()
            .map(|criterion| ResponseRubricScore::new(response_id, criterion.id, 3))
            .collect();
        group.bench_function(format!("criteria={criteria}"), |b| {
            b.iter(|| score_constructed(black_box(&rubric), black_box(&rows)))
        });
    }

    group.finish();
}

fn bench_summarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarize_attempt");

    for size in [10usize, 40, 120] {
        let attempt = StudentAttempt::new(Uuid::new_v4(), Uuid::new_v4());
        let items: Vec<Item> = (0..size)
            .map(|n| make_mcq(&format!("RC-{n:03}"), if n % 2 == 0 { "inference" } else { "vocabulary" }))
            .collect();
        let responses: Vec<Response> = items
            .iter()
            .map(|item| {
                let mut response = Response::new(attempt.id, item.id);
                response.selected_choice_id = Some(item.choices[0].id);
                response.score = ScoreState::scored(100, 100);
                response
            })
            .collect();
        let rows: Vec<ItemResponse<'_>> = items
            .iter()
            .zip(responses.iter())
            .map(|(item, response)| ItemResponse {
                item,
                response: Some(response),
            })
            .collect();
        group.bench_function(format!("items={size}"), |b| {
            b.iter(|| summarize_attempt(black_box(&attempt), black_box(&rows)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_score_mcq, bench_score_constructed, bench_summarize);
criterion_main!(benches);
