//! Item bank: listing with filters, authoring, lifecycle, and rubrics.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use rubricon_core::model::{
    Difficulty, Item, ItemChoice, ItemStatus, ItemType, Rubric, RubricCriterion, RubricLevel,
    MAX_LEVEL_SCORE, MCQ_MAX_SCORE,
};
use rubricon_core::roles::Capability;
use serde::Deserialize;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::envelope::{Envelope, FieldError};
use crate::error::ApiError;
use crate::pagination::{paginate, ListParams};
use crate::sort::{item_status_rank, parse_sort};
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Envelope<Vec<Item>>>, ApiError> {
    let sort = parse_sort(
        params.sort.as_deref(),
        &["code", "difficulty", "status", "created_at"],
        "code",
    )?;
    let status = params
        .status
        .as_deref()
        .map(ItemStatus::from_str)
        .transpose()
        .map_err(|e| ApiError::validation("status", e))?;
    let item_type = params
        .item_type
        .as_deref()
        .map(ItemType::from_str)
        .transpose()
        .map_err(|e| ApiError::validation("type", e))?;

    let mut items: Vec<Item> = state
        .store
        .list_items()
        .await
        .into_iter()
        .filter(|i| status.map_or(true, |s| i.status == s))
        .filter(|i| item_type.map_or(true, |t| i.item_type == t))
        .collect();
    match sort.key {
        "difficulty" => items.sort_by_key(|i| i.difficulty),
        "status" => items.sort_by_key(|i| item_status_rank(i.status)),
        "created_at" => items.sort_by_key(|i| i.created_at),
        _ => items.sort_by(|a, b| a.code.cmp(&b.code)),
    }
    if sort.descending {
        items.reverse();
    }
    let (rows, meta) = paginate(items, params.page(), params.per_page());
    Ok(Json(Envelope::page(rows, meta)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<Item>>, ApiError> {
    Ok(Json(Envelope::data(state.store.get_item(id).await?)))
}

#[derive(Debug, Deserialize)]
pub struct ItemPayload {
    pub code: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub difficulty: Difficulty,
    pub prompt: String,
    pub area: String,
    #[serde(default)]
    pub stimulus_id: Option<Uuid>,
    #[serde(default)]
    pub choices: Vec<ChoicePayload>,
}

#[derive(Debug, Deserialize)]
pub struct ChoicePayload {
    pub choice_no: u8,
    pub content: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub proximity_score: Option<u32>,
}

impl ItemPayload {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        if self.code.trim().is_empty() {
            errors.push(FieldError::new("code", "code is required"));
        }
        if self.prompt.trim().is_empty() {
            errors.push(FieldError::new("prompt", "prompt is required"));
        }
        if self.area.trim().is_empty() {
            errors.push(FieldError::new("area", "area is required"));
        }
        if self.item_type == ItemType::Constructed && !self.choices.is_empty() {
            errors.push(FieldError::new(
                "choices",
                "constructed items do not take choices",
            ));
        }
        let mut seen = Vec::new();
        for choice in &self.choices {
            if seen.contains(&choice.choice_no) {
                errors.push(FieldError::new(
                    "choices",
                    format!("duplicate choice_no {}", choice.choice_no),
                ));
            }
            seen.push(choice.choice_no);
            if choice.proximity_score.is_some_and(|p| p > MCQ_MAX_SCORE) {
                errors.push(FieldError::new(
                    "choices",
                    format!(
                        "proximity_score on choice {} exceeds {MCQ_MAX_SCORE}",
                        choice.choice_no
                    ),
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }

    /// Rebuild the choice list, keeping ids for choice numbers that
    /// already exist so responses pointing at them stay valid.
    fn merge_choices(&self, existing: &[ItemChoice]) -> Vec<ItemChoice> {
        self.choices
            .iter()
            .map(|pc| {
                let mut choice = match existing.iter().find(|c| c.choice_no == pc.choice_no) {
                    Some(prev) => prev.clone(),
                    None => ItemChoice::new(pc.choice_no, &pc.content),
                };
                choice.content = pc.content.clone();
                choice.is_correct = pc.is_correct;
                choice.proximity_score = pc.proximity_score;
                choice
            })
            .collect()
    }
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<ItemPayload>,
) -> Result<Json<Envelope<Item>>, ApiError> {
    ctx.require(Capability::AuthorItems)?;
    payload.validate()?;
    let mut item = Item::new(
        payload.code.trim(),
        payload.item_type,
        payload.difficulty,
        &payload.prompt,
        &payload.area,
    );
    item.stimulus_id = payload.stimulus_id;
    item.choices = payload.merge_choices(&[]);
    state.store.put_item(item.clone()).await?;
    Ok(Json(Envelope::data(item)))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ItemPayload>,
) -> Result<Json<Envelope<Item>>, ApiError> {
    ctx.require(Capability::AuthorItems)?;
    payload.validate()?;
    let mut item = state.store.get_item(id).await?;
    item.code = payload.code.trim().to_string();
    item.item_type = payload.item_type;
    item.difficulty = payload.difficulty;
    item.prompt = payload.prompt.clone();
    item.area = payload.area.clone();
    item.stimulus_id = payload.stimulus_id;
    item.choices = payload.merge_choices(&item.choices);
    item.updated_at = Utc::now();
    state.store.put_item(item.clone()).await?;
    Ok(Json(Envelope::data(item)))
}

pub async fn activate(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<Item>>, ApiError> {
    ctx.require(Capability::AuthorItems)?;
    let mut item = state.store.get_item(id).await?;
    item.activate()?;
    state.store.put_item(item.clone()).await?;
    Ok(Json(Envelope::data(item)))
}

pub async fn retire(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<Item>>, ApiError> {
    ctx.require(Capability::AuthorItems)?;
    let mut item = state.store.get_item(id).await?;
    item.retire()?;
    state.store.put_item(item.clone()).await?;
    Ok(Json(Envelope::data(item)))
}

pub async fn get_rubric(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<Rubric>>, ApiError> {
    let item = state.store.get_item(id).await?;
    let rubric = state
        .store
        .rubric_for_item(item.id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("item {} has no rubric", item.code)))?;
    Ok(Json(Envelope::data(rubric)))
}

#[derive(Debug, Deserialize)]
pub struct RubricPayload {
    pub criteria: Vec<CriterionPayload>,
}

#[derive(Debug, Deserialize)]
pub struct CriterionPayload {
    pub name: String,
    pub levels: Vec<RubricLevel>,
}

impl RubricPayload {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        if self.criteria.is_empty() {
            errors.push(FieldError::new("criteria", "at least one criterion"));
        }
        for criterion in &self.criteria {
            if criterion.name.trim().is_empty() {
                errors.push(FieldError::new("criteria", "criterion name is required"));
            }
            if criterion.levels.is_empty() {
                errors.push(FieldError::new(
                    "criteria",
                    format!("criterion '{}' has no levels", criterion.name),
                ));
            }
            for level in &criterion.levels {
                if level.score > MAX_LEVEL_SCORE {
                    errors.push(FieldError::new(
                        "criteria",
                        format!(
                            "level score {} on '{}' exceeds {MAX_LEVEL_SCORE}",
                            level.score, criterion.name
                        ),
                    ));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

/// Replaces the item's rubric wholesale, keeping the rubric id and any
/// criterion ids whose names survive so recorded scores stay attached.
pub async fn put_rubric(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<RubricPayload>,
) -> Result<Json<Envelope<Rubric>>, ApiError> {
    ctx.require(Capability::AuthorItems)?;
    let item = state.store.get_item(id).await?;
    if item.item_type != ItemType::Constructed {
        return Err(ApiError::validation(
            "item",
            "rubrics apply to constructed items only",
        ));
    }
    payload.validate()?;
    let rubric = match state.store.rubric_for_item(item.id).await {
        Some(mut existing) => {
            existing.criteria = merge_criteria(&existing.criteria, &payload);
            existing.updated_at = Utc::now();
            existing
        }
        None => Rubric::new(item.id, merge_criteria(&[], &payload)),
    };
    state.store.put_rubric(rubric.clone()).await?;
    Ok(Json(Envelope::data(rubric)))
}

fn merge_criteria(existing: &[RubricCriterion], payload: &RubricPayload) -> Vec<RubricCriterion> {
    payload
        .criteria
        .iter()
        .map(|pc| {
            let mut criterion = match existing.iter().find(|c| c.name == pc.name) {
                Some(prev) => prev.clone(),
                None => RubricCriterion::new(&pc.name, Vec::new()),
            };
            criterion.levels = pc.levels.clone();
            criterion
        })
        .collect()
}
