use super::hospitals::{SignalSet, AQ_GENERAL_HOSPITAL, AQ_WOMEN_HOSPITAL, SAQR_HOSPITAL};

/// One ordered inference rule: any matching code binds the student to a
/// hospital
#[derive(Debug, Clone)]
pub struct ContextRule {
    pub signals: SignalSet,
    pub hospital: String,
}

impl ContextRule {
    pub fn new(signals: SignalSet, hospital: impl Into<String>) -> Self {
        ContextRule { signals, hospital: hospital.into() }
    }
}

/// Infers a student's home hospital from their full set of raw codes
///
/// Used only to disambiguate codes that name no hospital on their own; an
/// explicit signal on the code being classified always wins over context.
#[derive(Debug, Clone)]
pub struct ContextDetector {
    rules: Vec<ContextRule>,
}

impl ContextDetector {
    pub fn new(rules: Vec<ContextRule>) -> Self {
        ContextDetector { rules }
    }

    /// Standard priority: specific Al Qasimi General signals first, then
    /// Women & Child, then generic critical care bound to Saqr
    pub fn standard() -> Self {
        ContextDetector::new(vec![
            ContextRule::new(SignalSet::general_hospital(), AQ_GENERAL_HOSPITAL),
            ContextRule::new(SignalSet::women_and_child(), AQ_WOMEN_HOSPITAL),
            ContextRule::new(SignalSet::generic_critical_care(), SAQR_HOSPITAL),
        ])
    }

    /// Returns the hospital bound to the first rule any code matches
    ///
    /// The rule order decides, not the code order, so permuting the code
    /// list cannot change the result.
    pub fn detect(&self, codes: &[String]) -> Option<String> {
        let codes: Vec<String> = codes
            .iter()
            .map(|c| c.trim().to_uppercase())
            .collect();
        for rule in &self.rules {
            if codes.iter().any(|code| rule.signals.matches(code)) {
                return Some(rule.hospital.clone());
            }
        }
        None
    }
}
