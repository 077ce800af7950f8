use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::policy::{MemberCategory, MemberCategoryPolicy, MemberStatus, SanctionType};
use super::store::{SanctionChange, SanctionStore, StoreError};
use crate::models::sanction::Sanction;

pub const MSG_INVALID_TYPE: &str = "Tipo di provvedimento non valido";
pub const MSG_INVALID_DATE: &str = "Data provvedimento non valida";
pub const MSG_SAVE_FAILED: &str = "Errore durante il salvataggio del provvedimento";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(thiserror::Error, Debug)]
pub enum SanctionError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Member {0} not found")]
    MemberNotFound(i64),

    #[error("Sanction {0} not found")]
    SanctionNotFound(i64),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl SanctionError {
    /// Message safe to show on the submitting form
    pub fn user_message(&self) -> String {
        match self {
            SanctionError::Validation(errors) => errors.join("; "),
            SanctionError::MemberNotFound(_) => "Socio non trovato".to_string(),
            SanctionError::SanctionNotFound(_) => "Provvedimento non trovato".to_string(),
            SanctionError::Persistence(_) => MSG_SAVE_FAILED.to_string(),
        }
    }
}

/// Raw sanction submission, as posted by the form or the JSON endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanctionInput {
    pub sanction_date: String, // YYYY-MM-DD
    pub sanction_type: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub created_by: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSanction {
    pub sanction_date: NaiveDate,
    pub sanction_type: SanctionType,
    pub reason: Option<String>,
}

/// Parses a strict `YYYY-MM-DD` date; the input must format back unchanged
pub fn parse_sanction_date(raw: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()?;
    (date.format(DATE_FORMAT).to_string() == raw).then_some(date)
}

/// Checks a submission against the category policy, collecting every problem
pub fn validate(
    policy: &MemberCategoryPolicy,
    input: &SanctionInput,
) -> Result<ValidatedSanction, SanctionError> {
    let mut errors = Vec::new();

    let sanction_type = policy.parse_type(&input.sanction_type);
    if sanction_type.is_none() {
        errors.push(MSG_INVALID_TYPE.to_string());
    }

    let sanction_date = parse_sanction_date(&input.sanction_date);
    if sanction_date.is_none() {
        errors.push(MSG_INVALID_DATE.to_string());
    }

    match (sanction_type, sanction_date) {
        (Some(sanction_type), Some(sanction_date)) => Ok(ValidatedSanction {
            sanction_date,
            sanction_type,
            reason: input
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        }),
        _ => Err(SanctionError::Validation(errors)),
    }
}

/// Prior sanction as seen by the derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorSanction {
    pub sanction_date: NaiveDate,
    pub sanction_type: SanctionType,
}

fn has_prior_suspension(
    policy: &MemberCategoryPolicy,
    sanction_date: NaiveDate,
    history: &[PriorSanction],
) -> bool {
    history
        .iter()
        .any(|prior| prior.sanction_date < sanction_date && policy.is_suspending(prior.sanction_type))
}

/// Computes the member status produced by a sanction.
///
/// Reactivation is evaluated before suspension consolidation. `history`
/// must not contain the sanction being written.
pub fn derive_status(
    policy: &MemberCategoryPolicy,
    sanction_type: SanctionType,
    sanction_date: NaiveDate,
    history: &[PriorSanction],
) -> MemberStatus {
    let mut new_status = MemberStatus::from(sanction_type);
    let mut reactivated = false;

    if sanction_type == policy.reactivation_keyword
        && has_prior_suspension(policy, sanction_date, history)
    {
        new_status = policy.reactivated_status;
        reactivated = true;
    }

    if !reactivated && policy.consolidates_to_suspended(sanction_type) {
        new_status = MemberStatus::Sospeso;
    }

    new_status
}

/// Approval and termination dates stamped on the member, if any
pub fn lifecycle_dates(
    policy: &MemberCategoryPolicy,
    sanction_type: SanctionType,
    sanction_date: NaiveDate,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    if !policy.records_lifecycle_dates {
        return (None, None);
    }

    match sanction_type {
        SanctionType::ApprovazioneConsiglioDirettivo => (Some(sanction_date), None),
        SanctionType::Escluso | SanctionType::Dimesso | SanctionType::Decaduto => {
            (None, Some(sanction_date))
        }
        _ => (None, None),
    }
}

fn prior_history(history: &[Sanction], editing: Option<i64>) -> Vec<PriorSanction> {
    history
        .iter()
        .filter(|s| Some(s.id) != editing)
        .filter_map(|s| match s.kind() {
            Some(sanction_type) => Some(PriorSanction {
                sanction_date: s.sanction_date,
                sanction_type,
            }),
            None => {
                tracing::debug!(
                    sanction_id = s.id,
                    sanction_type = %s.sanction_type,
                    "Ignoring sanction with unknown type"
                );
                None
            }
        })
        .collect()
}

/// Result of a successful sanction write
#[derive(Debug, Clone, Serialize)]
pub struct SanctionApplied {
    pub sanction: Sanction,
    pub new_status: MemberStatus,
}

/// Validates, derives the new status and persists sanction and status together.
///
/// `sanction_id` is `None` for a new sanction.
#[tracing::instrument(skip(store, input))]
pub async fn apply_sanction<S>(
    store: &S,
    category: MemberCategory,
    member_id: i64,
    sanction_id: Option<i64>,
    input: &SanctionInput,
) -> Result<SanctionApplied, SanctionError>
where
    S: SanctionStore + ?Sized,
{
    let policy = category.policy();

    let valid = validate(policy, input).map_err(|e| {
        tracing::debug!(error = %e, "Rejected sanction submission");
        e
    })?;

    store
        .find_member(category, member_id)
        .await?
        .ok_or(SanctionError::MemberNotFound(member_id))?;

    if let Some(id) = sanction_id {
        let existing = store.find_sanction(category, id).await?;
        if existing.map(|s| s.member_id) != Some(member_id) {
            return Err(SanctionError::SanctionNotFound(id));
        }
    }

    tracing::info!(
        sanction_type = %valid.sanction_type,
        sanction_date = %valid.sanction_date,
        "Adding/updating sanction"
    );

    let history = store.list_sanctions(category, member_id).await?;
    let prior = prior_history(&history, sanction_id);

    let new_status = derive_status(policy, valid.sanction_type, valid.sanction_date, &prior);
    let (approval_date, termination_date) =
        lifecycle_dates(policy, valid.sanction_type, valid.sanction_date);

    let change = SanctionChange {
        category,
        member_id,
        sanction_id,
        sanction_date: valid.sanction_date,
        sanction_type: valid.sanction_type,
        reason: valid.reason,
        created_by: input.created_by,
        new_status,
        approval_date,
        termination_date,
    };

    let sanction = store.apply_sanction(&change).await.map_err(|e| {
        tracing::error!(
            member_id,
            sanction_type = %change.sanction_type,
            sanction_date = %change.sanction_date,
            error = %e,
            "Failed to persist sanction"
        );
        SanctionError::Persistence(e)
    })?;

    tracing::info!(
        sanction_id = sanction.id,
        new_status = %new_status,
        "Sanction processed"
    );

    Ok(SanctionApplied {
        sanction,
        new_status,
    })
}

/// Flat result of `process_sanction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanctionOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<MemberStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SanctionOutcome {
    pub fn applied(new_status: MemberStatus) -> Self {
        Self {
            success: true,
            new_status: Some(new_status),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            new_status: None,
            error: Some(error.into()),
        }
    }
}

/// Processes a sanction save. A `sanction_id` of 0 (or below) creates a new sanction.
pub async fn process_sanction<S>(
    store: &S,
    category: MemberCategory,
    member_id: i64,
    sanction_id: i64,
    input: &SanctionInput,
) -> SanctionOutcome
where
    S: SanctionStore + ?Sized,
{
    let sanction_id = (sanction_id > 0).then_some(sanction_id);

    match apply_sanction(store, category, member_id, sanction_id, input).await {
        Ok(applied) => SanctionOutcome::applied(applied.new_status),
        Err(e) => SanctionOutcome::failed(e.user_message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn prior(d: NaiveDate, sanction_type: SanctionType) -> PriorSanction {
        PriorSanction {
            sanction_date: d,
            sanction_type,
        }
    }

    fn input(sanction_date: &str, sanction_type: &str) -> SanctionInput {
        SanctionInput {
            sanction_date: sanction_date.to_string(),
            sanction_type: sanction_type.to_string(),
            reason: None,
            created_by: 1,
        }
    }

    #[test]
    fn test_parse_sanction_date_is_strict() {
        assert_eq!(parse_sanction_date("2024-02-29"), Some(date(2024, 2, 29)));
        assert_eq!(parse_sanction_date("2023-02-29"), None);
        assert_eq!(parse_sanction_date("2024-02-30"), None);
        assert_eq!(parse_sanction_date("2024-1-5"), None);
        assert_eq!(parse_sanction_date("05/01/2024"), None);
        assert_eq!(parse_sanction_date(""), None);
        assert_eq!(parse_sanction_date(" 2024-03-01 "), None);
    }

    #[test]
    fn test_validate_rejects_padded_date_and_type() {
        let result = validate(&MemberCategoryPolicy::JUNIOR, &input(" 2024-03-01", "operativo "));
        match result {
            Err(SanctionError::Validation(errors)) => {
                assert_eq!(errors, vec![MSG_INVALID_TYPE, MSG_INVALID_DATE]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let result = validate(&MemberCategoryPolicy::ADULT, &input("2024-13-01", "operativo"));
        match result {
            Err(SanctionError::Validation(errors)) => {
                assert_eq!(errors, vec![MSG_INVALID_TYPE, MSG_INVALID_DATE]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_trims_and_drops_blank_reason() {
        let mut submission = input("2024-03-01", "sospeso");
        submission.reason = Some("   ".to_string());
        let valid = validate(&MemberCategoryPolicy::ADULT, &submission).unwrap();
        assert_eq!(valid.reason, None);

        submission.reason = Some("  assenze ripetute ".to_string());
        let valid = validate(&MemberCategoryPolicy::ADULT, &submission).unwrap();
        assert_eq!(valid.reason.as_deref(), Some("assenze ripetute"));
    }

    #[test]
    fn test_pass_through_ignores_history() {
        let history = [
            prior(date(2023, 1, 1), SanctionType::Sospeso),
            prior(date(2023, 6, 1), SanctionType::InCongedo),
        ];
        let empty: &[PriorSanction] = &[];
        for policy in [&MemberCategoryPolicy::ADULT, &MemberCategoryPolicy::JUNIOR] {
            for &sanction_type in policy.allowed.iter().filter(|t| policy.passes_through(**t)) {
                for h in [&history[..], empty] {
                    assert_eq!(
                        derive_status(policy, sanction_type, date(2024, 1, 1), h),
                        MemberStatus::from(sanction_type)
                    );
                }
            }
        }
    }

    #[test]
    fn test_leave_and_absence_consolidate_to_suspended() {
        let history = [prior(date(2023, 1, 1), SanctionType::Sospeso)];
        for policy in [&MemberCategoryPolicy::ADULT, &MemberCategoryPolicy::JUNIOR] {
            for sanction_type in [SanctionType::InAspettativa, SanctionType::InCongedo] {
                assert_eq!(
                    derive_status(policy, sanction_type, date(2024, 1, 1), &[]),
                    MemberStatus::Sospeso
                );
                assert_eq!(
                    derive_status(policy, sanction_type, date(2024, 1, 1), &history),
                    MemberStatus::Sospeso
                );
            }
        }
    }

    #[test]
    fn test_reactivation_without_suspension_keeps_literal() {
        let history = [prior(date(2023, 1, 1), SanctionType::Dimesso)];
        let junior = &MemberCategoryPolicy::JUNIOR;
        assert_eq!(
            derive_status(junior, SanctionType::Operativo, date(2024, 1, 1), &[]),
            MemberStatus::Operativo
        );
        assert_eq!(
            derive_status(junior, SanctionType::Operativo, date(2024, 1, 1), &history),
            MemberStatus::Operativo
        );

        let adult = &MemberCategoryPolicy::ADULT;
        assert_eq!(
            derive_status(adult, SanctionType::Attivo, date(2024, 1, 1), &history),
            MemberStatus::Attivo
        );
    }

    #[test]
    fn test_reactivation_after_any_suspending_type() {
        for suspending in [
            SanctionType::InAspettativa,
            SanctionType::Sospeso,
            SanctionType::InCongedo,
        ] {
            let history = [prior(date(2024, 1, 10), suspending)];
            assert_eq!(
                derive_status(
                    &MemberCategoryPolicy::JUNIOR,
                    SanctionType::Operativo,
                    date(2024, 3, 1),
                    &history
                ),
                MemberStatus::Attivo
            );
            assert_eq!(
                derive_status(
                    &MemberCategoryPolicy::ADULT,
                    SanctionType::Attivo,
                    date(2024, 3, 1),
                    &history
                ),
                MemberStatus::Attivo
            );
        }
    }

    #[test]
    fn test_suspension_on_same_or_later_date_does_not_count() {
        let junior = &MemberCategoryPolicy::JUNIOR;
        let history = [prior(date(2024, 1, 10), SanctionType::Sospeso)];

        assert_eq!(
            derive_status(junior, SanctionType::Operativo, date(2023, 12, 1), &history),
            MemberStatus::Operativo
        );
        assert_eq!(
            derive_status(junior, SanctionType::Operativo, date(2024, 1, 10), &history),
            MemberStatus::Operativo
        );
    }

    #[test]
    fn test_same_day_priors_any_suspension_suffices() {
        let history = [
            prior(date(2024, 1, 10), SanctionType::Dimesso),
            prior(date(2024, 1, 10), SanctionType::InCongedo),
        ];
        assert_eq!(
            derive_status(
                &MemberCategoryPolicy::JUNIOR,
                SanctionType::Operativo,
                date(2024, 2, 1),
                &history
            ),
            MemberStatus::Attivo
        );
    }

    #[test]
    fn test_lifecycle_dates_only_for_adults() {
        let d = date(2024, 4, 1);
        let adult = &MemberCategoryPolicy::ADULT;
        assert_eq!(
            lifecycle_dates(adult, SanctionType::ApprovazioneConsiglioDirettivo, d),
            (Some(d), None)
        );
        assert_eq!(lifecycle_dates(adult, SanctionType::Escluso, d), (None, Some(d)));
        assert_eq!(lifecycle_dates(adult, SanctionType::Sospeso, d), (None, None));
        assert_eq!(
            lifecycle_dates(&MemberCategoryPolicy::JUNIOR, SanctionType::Dimesso, d),
            (None, None)
        );
    }

    #[test]
    fn test_outcome_json_shape() {
        let ok = serde_json::to_value(SanctionOutcome::applied(MemberStatus::Sospeso)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "new_status": "sospeso"}));

        let failed = serde_json::to_value(SanctionOutcome::failed(MSG_INVALID_TYPE)).unwrap();
        assert_eq!(
            failed,
            serde_json::json!({"success": false, "error": "Tipo di provvedimento non valido"})
        );
    }
}
