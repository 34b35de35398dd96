// Wizard step ordering
//
// Linear sequence: Personal Details -> Vehicle Details -> Quote -> Additional -> Payment,
// followed by the confirmation screen (index 6) which is reached only through a submission.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WizardStep {
    PersonalDetails,
    VehicleDetails,
    Quote,
    Additional,
    Payment,
}

/// Index the presentation layer uses for the confirmation screen.
pub const CONFIRMATION_INDEX: usize = 6;

impl WizardStep {
    pub const FIRST: WizardStep = WizardStep::PersonalDetails;
    pub const LAST_INPUT: WizardStep = WizardStep::Payment;

    pub fn all() -> [WizardStep; 5] {
        [
            WizardStep::PersonalDetails,
            WizardStep::VehicleDetails,
            WizardStep::Quote,
            WizardStep::Additional,
            WizardStep::Payment,
        ]
    }

    /// 1-based position shown to the user.
    pub fn index(self) -> usize {
        match self {
            WizardStep::PersonalDetails => 1,
            WizardStep::VehicleDetails => 2,
            WizardStep::Quote => 3,
            WizardStep::Additional => 4,
            WizardStep::Payment => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::all().into_iter().find(|s| s.index() == index)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WizardStep::PersonalDetails => "Personal Details",
            WizardStep::VehicleDetails => "Vehicle Details",
            WizardStep::Quote => "Quote",
            WizardStep::Additional => "Additional",
            WizardStep::Payment => "Payment",
        }
    }

    /// Next input step; `None` past the last input step (the submission boundary).
    pub fn next(self) -> Option<Self> {
        match self {
            WizardStep::PersonalDetails => Some(WizardStep::VehicleDetails),
            WizardStep::VehicleDetails => Some(WizardStep::Quote),
            WizardStep::Quote => Some(WizardStep::Additional),
            WizardStep::Additional => Some(WizardStep::Payment),
            WizardStep::Payment => None,
        }
    }

    /// Previous input step; `None` at the first step.
    pub fn prev(self) -> Option<Self> {
        match self {
            WizardStep::PersonalDetails => None,
            WizardStep::VehicleDetails => Some(WizardStep::PersonalDetails),
            WizardStep::Quote => Some(WizardStep::VehicleDetails),
            WizardStep::Additional => Some(WizardStep::Quote),
            WizardStep::Payment => Some(WizardStep::Additional),
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
