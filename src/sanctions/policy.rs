use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Administrative action recorded against a member (provvedimento)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionType {
    ApprovazioneConsiglioDirettivo,
    Decaduto,
    Dimesso,
    Escluso,
    InAspettativa,
    Sospeso,
    InCongedo,
    Attivo,
    Operativo,
}

impl SanctionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SanctionType::ApprovazioneConsiglioDirettivo => "approvazione_consiglio_direttivo",
            SanctionType::Decaduto => "decaduto",
            SanctionType::Dimesso => "dimesso",
            SanctionType::Escluso => "escluso",
            SanctionType::InAspettativa => "in_aspettativa",
            SanctionType::Sospeso => "sospeso",
            SanctionType::InCongedo => "in_congedo",
            SanctionType::Attivo => "attivo",
            SanctionType::Operativo => "operativo",
        }
    }

    /// Label shown in the sanction forms
    pub fn label(&self) -> &'static str {
        match self {
            SanctionType::ApprovazioneConsiglioDirettivo => "Approvazione del Consiglio Direttivo",
            SanctionType::Decaduto => "Decadenza",
            SanctionType::Dimesso => "Dimissioni",
            SanctionType::Escluso => "Esclusione",
            SanctionType::InAspettativa => "In Aspettativa",
            SanctionType::Sospeso => "Sospeso",
            SanctionType::InCongedo => "In Congedo",
            SanctionType::Attivo => "Attivo",
            SanctionType::Operativo => "Operativo",
        }
    }
}

impl fmt::Display for SanctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sanction type: {0}")]
pub struct UnknownSanctionType(pub String);

impl FromStr for SanctionType {
    type Err = UnknownSanctionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approvazione_consiglio_direttivo" => Ok(SanctionType::ApprovazioneConsiglioDirettivo),
            "decaduto" => Ok(SanctionType::Decaduto),
            "dimesso" => Ok(SanctionType::Dimesso),
            "escluso" => Ok(SanctionType::Escluso),
            "in_aspettativa" => Ok(SanctionType::InAspettativa),
            "sospeso" => Ok(SanctionType::Sospeso),
            "in_congedo" => Ok(SanctionType::InCongedo),
            "attivo" => Ok(SanctionType::Attivo),
            "operativo" => Ok(SanctionType::Operativo),
            other => Err(UnknownSanctionType(other.to_string())),
        }
    }
}

/// Value written to `member_status`.
///
/// Statuses share the sanction vocabulary: a pass-through sanction sets the
/// status of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    ApprovazioneConsiglioDirettivo,
    Decaduto,
    Dimesso,
    Escluso,
    InAspettativa,
    Sospeso,
    InCongedo,
    Attivo,
    Operativo,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        SanctionType::from(*self).as_str()
    }
}

impl From<SanctionType> for MemberStatus {
    fn from(sanction_type: SanctionType) -> Self {
        match sanction_type {
            SanctionType::ApprovazioneConsiglioDirettivo => MemberStatus::ApprovazioneConsiglioDirettivo,
            SanctionType::Decaduto => MemberStatus::Decaduto,
            SanctionType::Dimesso => MemberStatus::Dimesso,
            SanctionType::Escluso => MemberStatus::Escluso,
            SanctionType::InAspettativa => MemberStatus::InAspettativa,
            SanctionType::Sospeso => MemberStatus::Sospeso,
            SanctionType::InCongedo => MemberStatus::InCongedo,
            SanctionType::Attivo => MemberStatus::Attivo,
            SanctionType::Operativo => MemberStatus::Operativo,
        }
    }
}

impl From<MemberStatus> for SanctionType {
    fn from(status: MemberStatus) -> Self {
        match status {
            MemberStatus::ApprovazioneConsiglioDirettivo => SanctionType::ApprovazioneConsiglioDirettivo,
            MemberStatus::Decaduto => SanctionType::Decaduto,
            MemberStatus::Dimesso => SanctionType::Dimesso,
            MemberStatus::Escluso => SanctionType::Escluso,
            MemberStatus::InAspettativa => SanctionType::InAspettativa,
            MemberStatus::Sospeso => SanctionType::Sospeso,
            MemberStatus::InCongedo => SanctionType::InCongedo,
            MemberStatus::Attivo => SanctionType::Attivo,
            MemberStatus::Operativo => SanctionType::Operativo,
        }
    }
}

/// Display label of a stored `member_status`; unrecognised values are shown as stored
pub fn status_label(raw: &str) -> &str {
    match raw.parse::<SanctionType>() {
        Ok(status) => status.label(),
        Err(_) => raw,
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which registry a member belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberCategory {
    Adult,
    Junior,
}

impl MemberCategory {
    pub fn policy(&self) -> &'static MemberCategoryPolicy {
        match self {
            MemberCategory::Adult => &MemberCategoryPolicy::ADULT,
            MemberCategory::Junior => &MemberCategoryPolicy::JUNIOR,
        }
    }

    /// Permission module guarding this registry
    pub fn module(&self) -> &'static str {
        match self {
            MemberCategory::Adult => "members",
            MemberCategory::Junior => "junior_members",
        }
    }

    /// URL prefix of the registry pages
    pub fn path_prefix(&self) -> &'static str {
        match self {
            MemberCategory::Adult => "/members",
            MemberCategory::Junior => "/junior-members",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MemberCategory::Adult => "Socio",
            MemberCategory::Junior => "Socio Minorenne",
        }
    }
}

const SUSPENDING: &[SanctionType] = &[
    SanctionType::InAspettativa,
    SanctionType::Sospeso,
    SanctionType::InCongedo,
];

const CONSOLIDATE_TO_SOSPESO: &[SanctionType] =
    &[SanctionType::InAspettativa, SanctionType::InCongedo];

/// Per-category parameters of the status derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberCategoryPolicy {
    pub category: MemberCategory,
    /// Sanction types accepted for this category, in form order
    pub allowed: &'static [SanctionType],
    /// Prior sanctions that make a later reactivation effective
    pub suspending: &'static [SanctionType],
    /// Submitted types rewritten to `sospeso`
    pub consolidate_to_suspended: &'static [SanctionType],
    pub reactivation_keyword: SanctionType,
    /// Status written when the reactivation follows a suspension
    pub reactivated_status: MemberStatus,
    /// Whether approval/termination dates are stamped on the member
    pub records_lifecycle_dates: bool,
}

impl MemberCategoryPolicy {
    pub const ADULT: MemberCategoryPolicy = MemberCategoryPolicy {
        category: MemberCategory::Adult,
        allowed: &[
            SanctionType::ApprovazioneConsiglioDirettivo,
            SanctionType::Decaduto,
            SanctionType::Dimesso,
            SanctionType::Escluso,
            SanctionType::InAspettativa,
            SanctionType::Sospeso,
            SanctionType::InCongedo,
            SanctionType::Attivo,
        ],
        suspending: SUSPENDING,
        consolidate_to_suspended: CONSOLIDATE_TO_SOSPESO,
        reactivation_keyword: SanctionType::Attivo,
        reactivated_status: MemberStatus::Attivo,
        records_lifecycle_dates: true,
    };

    pub const JUNIOR: MemberCategoryPolicy = MemberCategoryPolicy {
        category: MemberCategory::Junior,
        allowed: &[
            SanctionType::Decaduto,
            SanctionType::Dimesso,
            SanctionType::InAspettativa,
            SanctionType::Sospeso,
            SanctionType::InCongedo,
            SanctionType::Operativo,
        ],
        suspending: SUSPENDING,
        consolidate_to_suspended: CONSOLIDATE_TO_SOSPESO,
        reactivation_keyword: SanctionType::Operativo,
        reactivated_status: MemberStatus::Attivo,
        records_lifecycle_dates: false,
    };

    pub fn allows(&self, sanction_type: SanctionType) -> bool {
        self.allowed.contains(&sanction_type)
    }

    pub fn is_suspending(&self, sanction_type: SanctionType) -> bool {
        self.suspending.contains(&sanction_type)
    }

    pub fn consolidates_to_suspended(&self, sanction_type: SanctionType) -> bool {
        self.consolidate_to_suspended.contains(&sanction_type)
    }

    /// Allowed types that map to the status of the same name regardless of history
    pub fn passes_through(&self, sanction_type: SanctionType) -> bool {
        self.allows(sanction_type)
            && sanction_type != self.reactivation_keyword
            && !self.consolidates_to_suspended(sanction_type)
    }

    /// Parses a submitted type and checks it against this category
    pub fn parse_type(&self, raw: &str) -> Option<SanctionType> {
        raw.parse::<SanctionType>()
            .ok()
            .filter(|sanction_type| self.allows(*sanction_type))
    }

    /// Help lines shown above the sanction form
    pub fn rules_summary(&self) -> Vec<String> {
        let mut terminal: Vec<&str> = self
            .allowed
            .iter()
            .filter(|t| {
                matches!(
                    t,
                    SanctionType::Decaduto | SanctionType::Dimesso | SanctionType::Escluso
                )
            })
            .map(|t| t.label())
            .collect();
        terminal.sort_unstable();

        vec![
            "In Aspettativa/In Congedo: imposta lo stato a \"Sospeso\"".to_string(),
            format!(
                "{}: se inserito DOPO un provvedimento sospensivo, riporta lo stato ad \"Attivo\"",
                self.reactivation_keyword.label()
            ),
            format!("{}: imposta lo stato rispettivo", terminal.join("/")),
        ]
    }
}
