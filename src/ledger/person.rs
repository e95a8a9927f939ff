//! Persons and the detail accounts provisioned for them

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ledger::chart::{insert_detail_account, now, NewDetailAccount};
use crate::traits::*;
use crate::types::*;

/// Request to create a person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPerson {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl NewPerson {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: None,
        }
    }
}

/// A newly created person together with its detail account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionedPerson {
    pub person: Person,
    pub detail_account: DetailAccount,
}

/// Creates persons, each with a detail account under the customers root
pub struct PersonManager<S: LedgerStorage> {
    storage: S,
    customers_root_code: String,
}

impl<S: LedgerStorage> PersonManager<S> {
    pub fn new(storage: S, customers_root_code: impl Into<String>) -> Self {
        Self {
            storage,
            customers_root_code: customers_root_code.into(),
        }
    }

    /// Create a person and its detail account in one transaction
    #[tracing::instrument(skip_all, fields(name = %request.name))]
    pub async fn create_person(&self, request: NewPerson) -> LedgerResult<ProvisionedPerson> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::Validation(
                "Person name cannot be empty".to_string(),
            ));
        }
        let phone = request
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let lookup = name.clone();
        if self
            .storage
            .read(move |view| view.person_by_name(&lookup))
            .await?
            .is_some()
        {
            warn!("person name already taken");
            return Err(name_taken(&name));
        }

        let root_code = self.customers_root_code.clone();
        let provisioned = self
            .storage
            .transaction(move |tx| {
                // Checked again: another request may have won the name meanwhile
                if tx.person_by_name(&name)?.is_some() {
                    return Err(name_taken(&name));
                }
                let root = tx.sub_account_by_code(&root_code)?.ok_or_else(|| {
                    LedgerError::Precondition(format!(
                        "sub-account '{}' for customers does not exist; create the customers root account first",
                        root_code
                    ))
                })?;

                let person_id = PersonId(tx.next_id(Sequence::Person)?);
                let detail_account = insert_detail_account(
                    tx,
                    NewDetailAccount::new(root.id, name.clone()),
                    Some(person_id),
                )?;
                let person = Person {
                    id: person_id,
                    name,
                    phone,
                    detail_account_id: detail_account.id,
                    created_at: now(),
                };
                tx.insert_person(person.clone())?;

                Ok(ProvisionedPerson {
                    person,
                    detail_account,
                })
            })
            .await
            .inspect_err(|err| warn!(%err, "person provisioning failed"))?;

        info!(
            id = %provisioned.person.id,
            detail_account = %provisioned.detail_account.code,
            "person created"
        );
        Ok(provisioned)
    }

    pub async fn get_person(&self, id: PersonId) -> LedgerResult<Option<Person>> {
        self.storage.read(move |view| view.person(id)).await
    }

    pub async fn list_persons(&self) -> LedgerResult<Vec<Person>> {
        self.storage.read(|view| view.persons()).await
    }

    /// The person a detail account was provisioned for, if any
    pub async fn person_by_detail_account(
        &self,
        id: DetailAccountId,
    ) -> LedgerResult<Option<Person>> {
        self.storage
            .read(move |view| {
                let Some(detail) = view.detail_account(id)? else {
                    return Err(LedgerError::not_found("detail account", id));
                };
                match detail.person_id {
                    Some(person) => view.person(person),
                    None => Ok(None),
                }
            })
            .await
    }
}

fn name_taken(name: &str) -> LedgerError {
    LedgerError::Conflict(format!("a person named '{}' already exists", name))
}
