use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit::{AuditLog, action},
    error::{AppError, AppResult},
    models::{Ad, CreateAdRequest, UpdateAdRequest},
    repository::Repository,
    storage::Collection,
};

/// expire_on_read
///
/// The expiry policy: switches `active` off for every ad whose `endDate` has passed.
/// One-way; nothing here ever switches an ad on. Returns the ids that flipped.
pub fn expire_on_read(ads: &mut [Ad], now: DateTime<Utc>) -> Vec<Uuid> {
    ads.iter_mut()
        .filter(|ad| ad.active && ad.end_date.is_some_and(|end| end < now))
        .map(|ad| {
            ad.active = false;
            ad.id
        })
        .collect()
}

pub fn validate_window(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> AppResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(AppError::Validation(
            "startDate must not be after endDate".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Applies the expiry policy inside a write transaction and persists any flips.
async fn expire_stored(repo: &Repository, now: DateTime<Utc>) -> AppResult<(Vec<Ad>, Vec<Uuid>)> {
    repo.transaction(&[Collection::Ads], |tx| {
        let mut ads = tx.list::<Ad>()?;
        let expired = expire_on_read(&mut ads, now);
        if !expired.is_empty() {
            tx.replace_all(&ads)?;
        }
        Ok((ads, expired))
    })
    .await
}

/// list_ads
///
/// Every read of the ad collection goes through here. The common case (nothing to
/// expire) is served without taking the write lock.
pub async fn list_ads(repo: &Repository) -> AppResult<Vec<Ad>> {
    let now = Utc::now();
    let mut ads = repo.all::<Ad>().await?;
    if expire_on_read(&mut ads, now).is_empty() {
        return Ok(ads);
    }

    let (ads, expired) = expire_stored(repo, now).await?;
    if !expired.is_empty() {
        tracing::info!(count = expired.len(), "expired ads on read");
    }
    Ok(ads)
}

pub async fn get_ad(repo: &Repository, id: Uuid) -> AppResult<Ad> {
    list_ads(repo)
        .await?
        .into_iter()
        .find(|ad| ad.id == id)
        .ok_or_else(|| AppError::not_found("Ad"))
}

/// sweep
///
/// The scheduled counterpart of the read path: expires ads nobody has read lately
/// and logs `ads-expired` when anything changed.
pub async fn sweep(repo: &Repository, audit: &AuditLog) -> AppResult<usize> {
    let (_, expired) = expire_stored(repo, Utc::now()).await?;
    if !expired.is_empty() {
        let ids: Vec<String> = expired.iter().map(Uuid::to_string).collect();
        audit
            .record_system(action::ADS_EXPIRED, "ads", json!({ "ids": ids }))
            .await;
    }
    Ok(expired.len())
}

pub async fn create_ad(repo: &Repository, req: CreateAdRequest) -> AppResult<Ad> {
    validate_window(req.start_date, req.end_date)?;

    let ad = Ad {
        id: Uuid::new_v4(),
        kind: req.kind,
        category: req.category,
        company: req.company,
        link: req.link,
        html: req.html,
        text: req.text,
        file: req.file,
        start_date: req.start_date,
        end_date: req.end_date,
        active: req.active,
        created_at: Utc::now(),
        updated_at: None,
    };

    repo.transaction(&[Collection::Ads], |tx| tx.insert(&ad)).await?;
    Ok(ad)
}

/// Applies the present fields of `req`. The resulting window is validated as a whole.
pub async fn update_ad(repo: &Repository, id: Uuid, req: UpdateAdRequest) -> AppResult<Ad> {
    let key = id.to_string();
    repo.transaction(&[Collection::Ads], |tx| {
        let mut ad = tx.get::<Ad>(&key)?.ok_or_else(|| AppError::not_found("Ad"))?;

        if let Some(kind) = req.kind {
            ad.kind = kind;
        }
        if let Some(category) = req.category {
            ad.category = category;
        }
        if let Some(company) = req.company {
            ad.company = company;
        }
        if let Some(link) = req.link {
            ad.link = link;
        }
        if let Some(html) = req.html {
            ad.html = html;
        }
        if let Some(text) = req.text {
            ad.text = text;
        }
        if let Some(file) = req.file {
            ad.file = file;
        }
        if req.start_date.is_some() {
            ad.start_date = req.start_date;
        }
        if req.end_date.is_some() {
            ad.end_date = req.end_date;
        }
        if let Some(active) = req.active {
            ad.active = active;
        }
        validate_window(ad.start_date, ad.end_date)?;
        ad.updated_at = Some(Utc::now());

        tx.replace(&key, &ad)?;
        Ok(ad)
    })
    .await
}

pub async fn delete_ad(repo: &Repository, id: Uuid) -> AppResult<Ad> {
    let key = id.to_string();
    repo.transaction(&[Collection::Ads], |tx| {
        tx.remove::<Ad>(&key)?.ok_or_else(|| AppError::not_found("Ad"))
    })
    .await
}
