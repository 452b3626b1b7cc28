use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::error::ApiError,
    controller::AppState,
    domain::{CellType, ModulePatch, PvModule},
};

/// Module list response
#[derive(Debug, Serialize)]
pub struct ModuleListResponse {
    pub modules: Vec<PvModule>,
    pub total: usize,
}

/// Request to register a new module
#[derive(Debug, Deserialize, Validate)]
pub struct CreateModuleRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub celltype: String,
    #[validate(range(exclusive_min = 0.0))]
    pub voc: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub isc: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub vmp: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub imp: f64,
    #[validate(range(min = 1))]
    pub ns: i32,
    pub kv: f64,
    pub ki: f64,
    pub gamma_pmp: Option<f64>,
}

/// Request to update a module; absent fields stay unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateModuleRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub celltype: Option<String>,
    #[validate(range(exclusive_min = 0.0))]
    pub voc: Option<f64>,
    #[validate(range(exclusive_min = 0.0))]
    pub isc: Option<f64>,
    #[validate(range(exclusive_min = 0.0))]
    pub vmp: Option<f64>,
    #[validate(range(exclusive_min = 0.0))]
    pub imp: Option<f64>,
    #[validate(range(min = 1))]
    pub ns: Option<i32>,
    pub kv: Option<f64>,
    pub ki: Option<f64>,
    pub gamma_pmp: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// POST /api/v1/modules - Register a new module
pub async fn create_module(
    State(state): State<AppState>,
    Json(request): Json<CreateModuleRequest>,
) -> Result<(StatusCode, Json<PvModule>), ApiError> {
    request.validate()?;
    let celltype = parse_cell_type(&request.celltype)?;

    let module = PvModule {
        id: Uuid::new_v4(),
        name: request.name,
        celltype,
        voc: request.voc,
        isc: request.isc,
        vmp: request.vmp,
        imp: request.imp,
        ns: request.ns,
        kv: request.kv,
        ki: request.ki,
        gamma_pmp: request
            .gamma_pmp
            .unwrap_or(state.cfg.modules.default_gamma_pmp),
        created_at: Utc::now(),
    };
    let module = state.store.insert(module).await?;

    Ok((StatusCode::CREATED, Json(module)))
}

/// GET /api/v1/modules - List registered modules
pub async fn list_modules(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ModuleListResponse>, ApiError> {
    let modules = state
        .store
        .list(query.offset.unwrap_or(0), query.limit.unwrap_or(100))
        .await?;
    let total = modules.len();

    Ok(Json(ModuleListResponse { modules, total }))
}

/// GET /api/v1/modules/:id - Get module by ID
pub async fn get_module(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PvModule>, ApiError> {
    let module = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Module with ID {} not found", id)))?;

    Ok(Json(module))
}

/// PUT /api/v1/modules/:id - Update a module
pub async fn update_module(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateModuleRequest>,
) -> Result<Json<PvModule>, ApiError> {
    request.validate()?;
    let celltype = match &request.celltype {
        Some(raw) => Some(parse_cell_type(raw)?),
        None => None,
    };

    let patch = ModulePatch {
        name: request.name,
        celltype,
        voc: request.voc,
        isc: request.isc,
        vmp: request.vmp,
        imp: request.imp,
        ns: request.ns,
        kv: request.kv,
        ki: request.ki,
        gamma_pmp: request.gamma_pmp,
    };
    let module = state
        .store
        .update(id, patch)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Module with ID {} not found", id)))?;

    Ok(Json(module))
}

/// DELETE /api/v1/modules/:id - Remove a module
pub async fn delete_module(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Module with ID {} not found", id)))
    }
}

fn parse_cell_type(type_str: &str) -> Result<CellType, ApiError> {
    type_str.parse().map_err(|_: String| {
        ApiError::BadRequest(format!(
            "Invalid cell type: {}. Must be one of: {}",
            type_str,
            CellType::NAMES.join(", ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_type() {
        assert!(matches!(parse_cell_type("monoSi").unwrap(), CellType::MonoSi));
        assert!(matches!(parse_cell_type("cdte").unwrap(), CellType::CdTe));
        let err = parse_cell_type("perovskite").unwrap_err();
        match err {
            ApiError::BadRequest(msg) => {
                assert!(msg.contains("perovskite"));
                assert!(msg.contains("monoSi"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn create_request() -> CreateModuleRequest {
        CreateModuleRequest {
            name: "Standard Mono 300W".to_string(),
            celltype: "monoSi".to_string(),
            voc: 39.7,
            isc: 9.45,
            vmp: 32.9,
            imp: 9.12,
            ns: 60,
            kv: -0.123,
            ki: 0.0047,
            gamma_pmp: None,
        }
    }

    #[test]
    fn test_create_request_validation() {
        assert!(create_request().validate().is_ok());

        let mut bad = create_request();
        bad.name = String::new();
        assert!(bad.validate().is_err());

        let mut bad = create_request();
        bad.voc = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = create_request();
        bad.ns = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_update_request_validation_skips_absent_fields() {
        let empty = UpdateModuleRequest {
            name: None,
            celltype: None,
            voc: None,
            isc: None,
            vmp: None,
            imp: None,
            ns: None,
            kv: None,
            ki: None,
            gamma_pmp: None,
        };
        assert!(empty.validate().is_ok());

        let bad = UpdateModuleRequest {
            isc: Some(-1.0),
            ..empty
        };
        assert!(bad.validate().is_err());
    }
}
