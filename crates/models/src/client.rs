use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	Admin,
	Client,
}

/// Lifecycle status shared by the account and the assistant connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
	Active,
	Paused,
	Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
	pub id: String,
	pub user_id: String,
	pub company_name: String,
	#[serde(default)]
	pub client_name: Option<String>,
	#[serde(default)]
	pub manager_name: Option<String>,
	#[serde(default)]
	pub phone: Option<String>,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub status: Option<ClientStatus>,
	#[serde(default)]
	pub ai_status: Option<ClientStatus>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Payload for creating a client account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewClient {
	pub company_name: String,
	pub client_name: String,
	#[serde(default)]
	pub manager_name: Option<String>,
	pub phone: String,
	#[serde(default)]
	pub email: Option<String>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClientPatch {
	#[serde(default)]
	pub company_name: Option<String>,
	#[serde(default)]
	pub client_name: Option<String>,
	#[serde(default)]
	pub manager_name: Option<String>,
	#[serde(default)]
	pub phone: Option<String>,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub status: Option<ClientStatus>,
	#[serde(default)]
	pub ai_status: Option<ClientStatus>,
}

impl ClientPatch {
	pub fn is_empty(&self) -> bool {
		self.company_name.is_none()
			&& self.client_name.is_none()
			&& self.manager_name.is_none()
			&& self.phone.is_none()
			&& self.email.is_none()
			&& self.status.is_none()
			&& self.ai_status.is_none()
	}

	pub fn apply(self, client: &mut Client, now: DateTime<Utc>) {
		if let Some(v) = self.company_name {
			client.company_name = v;
		}
		if let Some(v) = self.client_name {
			client.client_name = Some(v);
		}
		if let Some(v) = self.manager_name {
			client.manager_name = Some(v);
		}
		if let Some(v) = self.phone {
			client.phone = Some(v);
		}
		if let Some(v) = self.email {
			client.email = Some(v);
		}
		if let Some(v) = self.status {
			client.status = Some(v);
		}
		if let Some(v) = self.ai_status {
			client.ai_status = Some(v);
		}
		client.updated_at = now;
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manager {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub phone: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn client() -> Client {
		let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
		Client {
			id: "c1".to_string(),
			user_id: "u1".to_string(),
			company_name: "Техно Сервис".to_string(),
			client_name: None,
			manager_name: None,
			phone: None,
			email: None,
			status: Some(ClientStatus::Active),
			ai_status: None,
			created_at: t,
			updated_at: t,
		}
	}

	#[test]
	fn test_patch_only_touches_given_fields() {
		let mut c = client();
		let now = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
		let patch = ClientPatch {
			ai_status: Some(ClientStatus::Paused),
			..ClientPatch::default()
		};
		assert!(!patch.is_empty());
		patch.apply(&mut c, now);
		assert_eq!(c.ai_status, Some(ClientStatus::Paused));
		assert_eq!(c.status, Some(ClientStatus::Active));
		assert_eq!(c.company_name, "Техно Сервис");
		assert_eq!(c.updated_at, now);
	}

	#[test]
	fn test_role_serializes_lowercase() {
		assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
		let r: Role = serde_json::from_str("\"client\"").unwrap();
		assert_eq!(r, Role::Client);
	}
}
