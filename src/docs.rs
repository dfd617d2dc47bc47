use crate::api::compensation::MovementResponse;
use crate::api::employee::EmployeeListResponse;
use crate::attrition::service::{Dataset, DatasetRow, Prediction, PredictionSet};
use crate::model::employee::{Employee, EmployeeStatus, EmploymentType};
use crate::model::salary_movement::{MovementStatus, MovementType, SalaryMovement};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Portal API",
        version = "1.0.0",
        description = r#"
## HR compensation & attrition portal

JSON companion to the server-rendered HR pages.

### Key features
- **Employees**: paginated listing with filters, lookup, partial update and delete
- **Compensation**: salary movements with their approval status
- **Attrition**: the normalised training dataset and the server baseline model's predictions

### Response format
- JSON bodies; errors are `{"message": "..."}` with a 4xx/5xx status
- Per-IP rate limiting applies to every endpoint

Paths are shown with the default `/api` prefix (`API_PREFIX`).
"#,
    ),
    paths(
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::attrition::dataset,
        crate::api::attrition::predictions_handler,

        crate::api::compensation::list_movements
    ),
    components(
        schemas(
            Employee,
            EmployeeStatus,
            EmploymentType,
            EmployeeListResponse,
            SalaryMovement,
            MovementType,
            MovementStatus,
            MovementResponse,
            Dataset,
            DatasetRow,
            Prediction,
            PredictionSet
        )
    ),
    tags(
        (name = "Employee", description = "Employee directory APIs"),
        (name = "Compensation", description = "Salary movement APIs"),
        (name = "Attrition", description = "Attrition dataset and baseline model APIs"),
    )
)]
pub struct ApiDoc;
