use actix_web::{HttpResponse, http::header};
use serde::Deserialize;
use strum::{AsRefStr, EnumIter, EnumString};

/// Outcome of a form POST, carried to the next GET as `?flash=<code>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Flash {
    EmployeeAdded,
    EmployeeUpdated,
    EmployeeDeleted,
    SalaryRecordAdded,
    SalaryRecordPaid,
    BonusRecordAdded,
    BonusStatusUpdated,
    AllowanceAdded,
    AllowanceToggled,
    AllowanceDeleted,
    StructureAdded,
    StructureToggled,
    BonusesGenerated,
    MovementSubmitted,
    MovementApproved,
    MovementRejected,
    FeedbackSaved,

    InvalidEmployee,
    DuplicateEmployee,
    EmployeeNotFound,
    NothingToUpdate,
    InvalidSalaryRecord,
    InvalidBonusRecord,
    RecordNotFound,
    InvalidAllowance,
    InvalidStructure,
    StructureNotFound,
    NoEligibleEmployees,
    InvalidMovement,
    MovementNotPending,
    InvalidFeedback,
    DatabaseError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl Flash {
    pub fn message(&self) -> &'static str {
        match self {
            Flash::EmployeeAdded => "Employee added.",
            Flash::EmployeeUpdated => "Employee updated.",
            Flash::EmployeeDeleted => "Employee deleted.",
            Flash::SalaryRecordAdded => "Salary record added.",
            Flash::SalaryRecordPaid => "Salary record marked as paid.",
            Flash::BonusRecordAdded => "Bonus record added.",
            Flash::BonusStatusUpdated => "Bonus status updated.",
            Flash::AllowanceAdded => "Allowance rule added.",
            Flash::AllowanceToggled => "Allowance rule updated.",
            Flash::AllowanceDeleted => "Allowance rule deleted.",
            Flash::StructureAdded => "Bonus structure added.",
            Flash::StructureToggled => "Bonus structure updated.",
            Flash::BonusesGenerated => "Pending bonus records generated for eligible employees.",
            Flash::MovementSubmitted => "Salary movement submitted for approval.",
            Flash::MovementApproved => "Salary movement approved and salary updated.",
            Flash::MovementRejected => "Salary movement rejected.",
            Flash::FeedbackSaved => "Training feedback saved.",

            Flash::InvalidEmployee => "Please check the employee details: name, code and a valid email are required, amounts cannot be negative and the rating must be between 1 and 5.",
            Flash::DuplicateEmployee => "An employee with this code or email already exists.",
            Flash::EmployeeNotFound => "Employee not found.",
            Flash::NothingToUpdate => "Nothing to update.",
            Flash::InvalidSalaryRecord => "Please check the salary record: amounts cannot be negative.",
            Flash::InvalidBonusRecord => "Please check the bonus record: the amount must be greater than zero.",
            Flash::RecordNotFound => "Record not found.",
            Flash::InvalidAllowance => "Please check the allowance: grade and department are required and the amount must be greater than zero.",
            Flash::InvalidStructure => "Please check the bonus structure: a name and a positive value are required, percentages cannot exceed 100 and the minimum rating must be between 1 and 5.",
            Flash::StructureNotFound => "Bonus structure not found.",
            Flash::NoEligibleEmployees => "No employee is eligible for this bonus structure.",
            Flash::InvalidMovement => "Please check the salary movement: the new salary must be positive and match the movement type.",
            Flash::MovementNotPending => "Only pending salary movements can be approved or rejected.",
            Flash::InvalidFeedback => "Please check the feedback: unknown employee or risk outside 0 to 1.",
            Flash::DatabaseError => "Something went wrong while saving. Please try again.",
        }
    }

    pub fn kind(&self) -> FlashKind {
        match self {
            Flash::InvalidEmployee
            | Flash::DuplicateEmployee
            | Flash::EmployeeNotFound
            | Flash::NothingToUpdate
            | Flash::InvalidSalaryRecord
            | Flash::InvalidBonusRecord
            | Flash::RecordNotFound
            | Flash::InvalidAllowance
            | Flash::InvalidStructure
            | Flash::StructureNotFound
            | Flash::NoEligibleEmployees
            | Flash::InvalidMovement
            | Flash::MovementNotPending
            | Flash::InvalidFeedback
            | Flash::DatabaseError => FlashKind::Error,
            _ => FlashKind::Success,
        }
    }

    /// 303 back to `location` with this flash attached.
    pub fn redirect(self, location: &str) -> HttpResponse {
        let separator = if location.contains('?') { '&' } else { '?' };
        HttpResponse::SeeOther()
            .insert_header((
                header::LOCATION,
                format!("{location}{separator}flash={}", self.as_ref()),
            ))
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub flash: Option<String>,
}

impl FlashQuery {
    /// Unknown codes are ignored.
    pub fn flash(&self) -> Option<Flash> {
        self.flash.as_deref().and_then(|code| code.parse().ok())
    }
}
