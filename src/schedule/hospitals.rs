use regex::Regex;
use serde::{Serialize, Deserialize};

pub const SAQR_HOSPITAL: &str = "Saqr Hospital";
pub const AQ_GENERAL_HOSPITAL: &str = "Al Qasimi General Hospital";
pub const AQ_WOMEN_HOSPITAL: &str = "Al Qasimi Women & Child Hospital";
pub const ABDULLAH_HOSPITAL: &str = "Abdullah Bin Omran Hospital";
pub const DIBBA_HOSPITAL: &str = "Dibba Hospital";
pub const COMMUNITY_HEALTH: &str = "Community Health";
pub const AL_KUWAIT_HOSPITAL: &str = "Al Kuwait Sharjah Hospital";
pub const RAK_PHC: &str = "RAK PHC";

/// A canonical hospital with its badge color
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hospital {
    pub name: String,
    pub color: String,
}

impl Hospital {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Hospital { name: name.into(), color: color.into() }
    }
}

/// The closed set of hospitals a deployment classifies into
///
/// The review color marks cells the ruleset could not place, so they stand
/// out for manual correction.
#[derive(Debug, Clone)]
pub struct HospitalDirectory {
    hospitals: Vec<Hospital>,
    review_color: String,
}

impl HospitalDirectory {
    pub fn new(hospitals: Vec<Hospital>, review_color: impl Into<String>) -> Self {
        HospitalDirectory { hospitals, review_color: review_color.into() }
    }

    /// The eight-hospital directory used by the rotation deployment
    pub fn standard() -> Self {
        HospitalDirectory::new(
            vec![
                Hospital::new(SAQR_HOSPITAL, "bg-yellow-500"),
                Hospital::new(AQ_GENERAL_HOSPITAL, "bg-orange-500"),
                Hospital::new(AQ_WOMEN_HOSPITAL, "bg-rose-500"),
                Hospital::new(ABDULLAH_HOSPITAL, "bg-blue-500"),
                Hospital::new(DIBBA_HOSPITAL, "bg-green-500"),
                Hospital::new(COMMUNITY_HEALTH, "bg-cyan-500"),
                Hospital::new(AL_KUWAIT_HOSPITAL, "bg-emerald-400"),
                Hospital::new(RAK_PHC, "bg-cyan-500"),
            ],
            "bg-blue-600",
        )
    }

    pub fn hospitals(&self) -> &[Hospital] {
        &self.hospitals
    }

    pub fn review_color(&self) -> &str {
        &self.review_color
    }

    /// Color bound to a hospital name, if the name is known
    pub fn color_for(&self, name: &str) -> Option<&str> {
        self.hospitals
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.color.as_str())
    }

    /// Resolves an explicitly supplied hospital name to a name/color pair
    ///
    /// Unknown names keep their text but get the review color.
    pub fn label_for(&self, name: &str) -> Hospital {
        Hospital::new(
            name,
            self.color_for(name).unwrap_or(&self.review_color),
        )
    }
}

/// One way a rule can match an uppercased, trimmed shift code
#[derive(Debug, Clone)]
pub enum CodePattern {
    Prefix(String),
    Contains(String),
    Exact(String),
    Matches(Regex),
}

impl CodePattern {
    pub fn matches(&self, code: &str) -> bool {
        match self {
            CodePattern::Prefix(prefix) => code.starts_with(prefix.as_str()),
            CodePattern::Contains(needle) => code.contains(needle.as_str()),
            CodePattern::Exact(exact) => code == exact,
            CodePattern::Matches(regex) => regex.is_match(code),
        }
    }
}

fn prefix(p: &str) -> CodePattern {
    CodePattern::Prefix(p.to_string())
}

fn contains(s: &str) -> CodePattern {
    CodePattern::Contains(s.to_string())
}

fn exact(e: &str) -> CodePattern {
    CodePattern::Exact(e.to_string())
}

/// A named group of code patterns shared by the classifier and the
/// context detector, so the two cannot drift apart
#[derive(Debug, Clone)]
pub struct SignalSet {
    patterns: Vec<CodePattern>,
}

impl SignalSet {
    pub fn new(patterns: Vec<CodePattern>) -> Self {
        SignalSet { patterns }
    }

    pub fn matches(&self, code: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(code))
    }

    /// Numbered units and named wards specific to Al Qasimi General
    pub fn general_hospital() -> Self {
        SignalSet::new(vec![
            CodePattern::Matches(Regex::new(r"ICU\s?\d").unwrap()),
            CodePattern::Matches(Regex::new(r"ER\s?\d").unwrap()),
            exact("SU"),
            exact("HD"),
            exact("MCW"),
            exact("CICU"),
            exact("CCU"),
            exact("MSW"),
            exact("FSW"),
            exact("MMW"),
            exact("FMW"),
            contains("ENDOSCOPY"),
        ])
    }

    /// Obstetric and paediatric codes from the Women & Child campus
    pub fn women_and_child() -> Self {
        SignalSet::new(vec![
            contains("OBG"),
            exact("LR"),
            contains("OBS"),
            exact("NICU"),
            contains("PEAD"),
            prefix("PN"),
        ])
    }

    /// Critical-care codes that name no hospital on their own
    pub fn generic_critical_care() -> Self {
        SignalSet::new(vec![
            exact("ICU"),
            exact("ER"),
            exact("OT"),
            exact("OPD"),
            exact("AE"),
            exact("MW"),
        ])
    }
}

/// A single first-match-wins classification rule
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub signals: SignalSet,
    /// Context hospital the student must be in for this rule to apply
    pub requires_context: Option<String>,
    pub hospital: Hospital,
}

impl ClassificationRule {
    fn applies(&self, code: &str, context: Option<&str>) -> bool {
        if let Some(required) = &self.requires_context {
            if context != Some(required.as_str()) {
                return false;
            }
        }
        self.signals.matches(code)
    }
}

/// Ordered rule classifier for raw shift codes
///
/// Rules are evaluated top to bottom; the first match wins. Specific rules
/// (manual prefixes, campus signal sets) precede the generic fallbacks.
#[derive(Debug, Clone)]
pub struct HospitalClassifier {
    rules: Vec<ClassificationRule>,
    fallback: Hospital,
}

impl HospitalClassifier {
    pub fn new(rules: Vec<ClassificationRule>, fallback: Hospital) -> Self {
        HospitalClassifier { rules, fallback }
    }

    /// Standard ruleset over the standard directory
    pub fn standard() -> Self {
        Self::with_directory(&HospitalDirectory::standard())
    }

    /// Builds the standard ruleset, taking colors from the given directory
    pub fn with_directory(directory: &HospitalDirectory) -> Self {
        let rule = |signals: SignalSet, name: &str| ClassificationRule {
            signals,
            requires_context: None,
            hospital: directory.label_for(name),
        };

        let rules = vec![
            // Manual prefixes planners put directly in the sheet
            rule(
                SignalSet::new(vec![prefix("AB-"), prefix("AB_"), prefix("ABDULLAH")]),
                ABDULLAH_HOSPITAL,
            ),
            rule(
                SignalSet::new(vec![prefix("DB-"), prefix("DB_"), prefix("DIBBA")]),
                DIBBA_HOSPITAL,
            ),
            rule(
                SignalSet::new(vec![prefix("AQW-"), prefix("AQW_")]),
                AQ_WOMEN_HOSPITAL,
            ),
            rule(
                SignalSet::new(vec![prefix("AQG-"), prefix("AQG_"), prefix("AQ-")]),
                AQ_GENERAL_HOSPITAL,
            ),
            rule(
                SignalSet::new(vec![prefix("S-"), prefix("S_"), prefix("SAQR")]),
                SAQR_HOSPITAL,
            ),
            rule(
                SignalSet::new(vec![contains("COMMUNITY"), contains("HC"), contains("PHC")]),
                COMMUNITY_HEALTH,
            ),
            rule(SignalSet::women_and_child(), AQ_WOMEN_HOSPITAL),
            rule(SignalSet::general_hospital(), AQ_GENERAL_HOSPITAL),
            // Generic codes resolve to the student's hospital only when that
            // context is Al Qasimi General; otherwise they belong to Saqr
            ClassificationRule {
                signals: SignalSet::generic_critical_care(),
                requires_context: Some(AQ_GENERAL_HOSPITAL.to_string()),
                hospital: directory.label_for(AQ_GENERAL_HOSPITAL),
            },
            rule(SignalSet::generic_critical_care(), SAQR_HOSPITAL),
        ];

        HospitalClassifier::new(
            rules,
            Hospital::new(AQ_GENERAL_HOSPITAL, directory.review_color()),
        )
    }

    /// Maps one raw code (plus optional student context) to a hospital
    ///
    /// Pure: the same code and context always produce the same label. Codes
    /// matching no rule get the fallback hospital with the review color.
    pub fn classify(&self, code: &str, context: Option<&str>) -> Hospital {
        let code = code.trim().to_uppercase();
        for rule in &self.rules {
            if rule.applies(&code, context) {
                return rule.hospital.clone();
            }
        }
        log::debug!("shift code {:?} matched no rule, marked for review", code);
        self.fallback.clone()
    }
}
