use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::Lifecycle;

text_enum!(
    ClientType {
        Person => "Person",
        Company => "Company",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    pub property_id: Uuid,
    pub client_type: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub nationality: Option<String>,
    pub address: Option<String>,
    pub is_vip: bool,
    pub loyalty_tier: Option<String>,
    pub total_stays: i32,
    pub notes: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

impl Client {
    pub fn display_name(&self) -> String {
        match (self.client_type.as_str(), &self.company_name, &self.last_name) {
            ("Company", Some(company), _) => company.clone(),
            (_, _, Some(last)) => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    pub client_type: Option<ClientType>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub nationality: Option<String>,
    pub address: Option<String>,
    pub is_vip: Option<bool>,
    pub loyalty_tier: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientQuery {
    pub search: Option<String>,
    pub vip: Option<bool>,
    pub tier: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn client(kind: &str, last: Option<&str>, company: Option<&str>) -> Client {
        Client {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            client_type: kind.to_string(),
            first_name: "Ana".to_string(),
            last_name: last.map(str::to_string),
            company_name: company.map(str::to_string),
            tax_id: None,
            email: None,
            phone: None,
            document_type: None,
            document_number: None,
            nationality: None,
            address: None,
            is_vip: false,
            loyalty_tier: None,
            total_stays: 0,
            notes: None,
            lifecycle: Lifecycle {
                created_at: Utc::now(),
                deleted_at: None,
            },
        }
    }

    #[test]
    fn display_name_prefers_company_for_companies() {
        assert_eq!(client("Company", Some("Ruiz"), Some("Acme SA")).display_name(), "Acme SA");
        assert_eq!(client("Person", Some("Ruiz"), Some("Acme SA")).display_name(), "Ana Ruiz");
        assert_eq!(client("Person", None, None).display_name(), "Ana");
    }
}
