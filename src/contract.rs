//! Request and response shapes exchanged with an HTTP front end
//!
//! No server ships with the crate. A front end deserializes these types
//! from request bodies and query strings, calls [`crate::Ledger`], and
//! renders results or [`ApiError`]s with the status each [`Route`] assigns.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::ledger::{NewCategory, NewDetailAccount, NewSubAccount, VoucherLine, VoucherRequest};
use crate::reports::TurnoverQuery;
use crate::types::*;

/// `POST /categories` body
pub type CreateCategoryRequest = NewCategory;
/// `POST /accounts` body
pub type CreateSubAccountRequest = NewSubAccount;
/// `POST /detail-accounts` body
pub type CreateDetailAccountRequest = NewDetailAccount;

/// The endpoints the ledger backs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `POST /vouchers`
    CreateVoucher,
    /// `GET /accounts/{id}`
    GetAccount,
    /// `POST /categories`, `POST /accounts`, `POST /detail-accounts`
    CreateChartNode,
    /// `DELETE /accounts/{id}`
    DeleteAccount,
    /// `GET /reports/account-turnover`
    AccountTurnover,
}

impl Route {
    pub fn success_status(&self) -> u16 {
        match self {
            Route::CreateVoucher | Route::CreateChartNode => 201,
            Route::GetAccount | Route::DeleteAccount | Route::AccountTurnover => 200,
        }
    }

    /// Status for a failed call; write routes report every caller error as 400
    pub fn error_status(&self, kind: ErrorKind) -> u16 {
        match (self, kind) {
            (_, ErrorKind::Storage) => 500,
            (Route::GetAccount, _) | (Route::AccountTurnover, _) => kind.status_code(),
            _ => 400,
        }
    }
}

/// `POST /vouchers` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVoucherRequest {
    pub voucher_date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items: Vec<VoucherItemRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherItemRequest {
    #[serde(default)]
    pub sub_account_id: Option<SubAccountId>,
    /// Takes precedence over `subAccountId` when both are sent
    #[serde(default)]
    pub detail_account_id: Option<DetailAccountId>,
    #[serde(default)]
    pub person_id: Option<PersonId>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub debit: BigDecimal,
    #[serde(default)]
    pub credit: BigDecimal,
}

impl TryFrom<CreateVoucherRequest> for VoucherRequest {
    type Error = LedgerError;

    fn try_from(body: CreateVoucherRequest) -> Result<Self, Self::Error> {
        let lines = body
            .items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let account = match (item.detail_account_id, item.sub_account_id) {
                    (Some(detail), _) => AccountRef::DetailAccount(detail),
                    (None, Some(sub_account)) => AccountRef::SubAccount(sub_account),
                    (None, None) => {
                        return Err(LedgerError::Validation(format!(
                            "Item {}: subAccountId or detailAccountId is required",
                            index + 1
                        )))
                    }
                };
                Ok(VoucherLine {
                    account,
                    person_id: item.person_id,
                    description: item.description,
                    debit: item.debit,
                    credit: item.credit,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        Ok(VoucherRequest {
            voucher_date: body.voucher_date,
            description: body.description,
            lines,
        })
    }
}

/// `201` body of `POST /vouchers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherResponse {
    pub id: VoucherId,
    pub voucher_number: String,
    pub voucher_date: NaiveDate,
    pub description: String,
    pub total_amount: BigDecimal,
    pub items: Vec<VoucherItem>,
}

impl From<Voucher> for VoucherResponse {
    fn from(voucher: Voucher) -> Self {
        Self {
            id: voucher.id,
            voucher_number: voucher.voucher_number,
            voucher_date: voucher.voucher_date,
            description: voucher.description,
            total_amount: voucher.total_amount,
            items: voucher.items,
        }
    }
}

/// Query string of `GET /reports/account-turnover`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnoverParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub account_type: Option<String>,
}

impl TryFrom<TurnoverParams> for TurnoverQuery {
    type Error = LedgerError;

    fn try_from(params: TurnoverParams) -> Result<Self, Self::Error> {
        let mut query = TurnoverQuery::new(params.start_date, params.end_date);
        if let Some(account_type) = params.account_type.filter(|t| !t.trim().is_empty()) {
            query = query.account_type(account_type.parse()?);
        }
        Ok(query)
    }
}

/// Error body returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: u16,
    pub error: ErrorKind,
    pub message: String,
}

impl ApiError {
    /// Map an error for `route`; storage detail is only shown in development
    pub fn from_error(route: Route, err: &LedgerError, development: bool) -> Self {
        let kind = err.kind();
        let message = match kind {
            ErrorKind::Storage if !development => {
                error!(%err, "storage failure");
                "internal storage error".to_string()
            }
            _ => err.to_string(),
        };
        Self {
            status: route.error_status(kind),
            error: kind,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn voucher_body_maps_to_request() {
        let body: CreateVoucherRequest = serde_json::from_value(json!({
            "voucherDate": "2024-03-01",
            "description": "Capital",
            "items": [
                { "subAccountId": 2, "debit": "10000000" },
                { "subAccountId": 1, "detailAccountId": 7, "personId": 3, "debit": 5000000 },
                { "subAccountId": 6, "credit": "15000000", "description": "owner" }
            ]
        }))
        .unwrap();

        let request = VoucherRequest::try_from(body).unwrap();
        assert_eq!(request.lines.len(), 3);
        assert_eq!(request.lines[0].account, AccountRef::SubAccount(SubAccountId(2)));
        assert_eq!(request.lines[0].credit, BigDecimal::from(0));
        assert_eq!(
            request.lines[1].account,
            AccountRef::DetailAccount(DetailAccountId(7))
        );
        assert_eq!(request.lines[1].person_id, Some(PersonId(3)));
        assert_eq!(request.total_debits(), request.total_credits());
    }

    #[test]
    fn item_without_account_is_rejected() {
        let body: CreateVoucherRequest = serde_json::from_value(json!({
            "voucherDate": "2024-03-01",
            "description": "Broken",
            "items": [{ "debit": "10" }]
        }))
        .unwrap();

        let err = VoucherRequest::try_from(body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("Item 1"));
    }

    #[test]
    fn create_requests_use_camel_case() {
        let category: CreateCategoryRequest = serde_json::from_value(json!({
            "name": "Current Assets",
            "parentId": 1
        }))
        .unwrap();
        assert_eq!(category.parent_id, Some(CategoryId(1)));
        assert!(category.code.is_none());

        let account: CreateSubAccountRequest = serde_json::from_value(json!({
            "code": "1-0009",
            "name": "Petty Cash",
            "categoryId": 1
        }))
        .unwrap();
        assert_eq!(account.code.as_deref(), Some("1-0009"));
    }

    #[test]
    fn turnover_params_parse_account_type() {
        let params: TurnoverParams = serde_json::from_value(json!({
            "startDate": "2024-01-01",
            "endDate": "2024-12-31",
            "accountType": "Asset"
        }))
        .unwrap();
        let query = TurnoverQuery::try_from(params).unwrap();
        assert_eq!(query.account_type, Some(AccountType::Asset));
        assert!(query.accounts.is_none());

        let params = TurnoverParams {
            start_date: query.start_date,
            end_date: query.end_date,
            account_type: Some("bogus".to_string()),
        };
        assert!(TurnoverQuery::try_from(params).is_err());
    }

    #[test]
    fn errors_map_to_route_statuses() {
        let conflict = LedgerError::Conflict("sub-account is referenced".to_string());
        assert_eq!(ApiError::from_error(Route::DeleteAccount, &conflict, false).status, 400);

        let missing = LedgerError::not_found("sub-account", 9);
        assert_eq!(ApiError::from_error(Route::GetAccount, &missing, false).status, 404);
        assert_eq!(ApiError::from_error(Route::CreateChartNode, &missing, false).status, 400);

        let unbalanced = LedgerError::Unbalanced {
            debits: BigDecimal::from(10000),
            credits: BigDecimal::from(9000),
        };
        let api = ApiError::from_error(Route::CreateVoucher, &unbalanced, false);
        assert_eq!(api.status, 400);
        assert_eq!(
            serde_json::to_value(&api).unwrap()["error"],
            json!("validation")
        );
    }

    #[test]
    fn storage_detail_is_hidden_outside_development() {
        let err = LedgerError::Storage("lock poisoned at tables.rs".to_string());

        let production = ApiError::from_error(Route::CreateVoucher, &err, false);
        assert_eq!(production.status, 500);
        assert!(!production.message.contains("tables.rs"));

        let development = ApiError::from_error(Route::CreateVoucher, &err, true);
        assert!(development.message.contains("tables.rs"));
    }
}
