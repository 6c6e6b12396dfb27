use serde::{Deserialize, Serialize};

/// Role assigned to a portal user.
///
/// The set is closed. Any role string the server sends that is not listed
/// here parses to `Role::User` instead of failing the whole profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    ServiceManager,
    PayrollFormManager,
    SettlementClerk,
    Biller,
    Approver,
    FleetManager,
    PayrollManager,
    MileageController,
    #[default]
    User,
}

impl Role {
    pub const ALL: [Role; 10] = [
        Role::Admin,
        Role::ServiceManager,
        Role::PayrollFormManager,
        Role::SettlementClerk,
        Role::Biller,
        Role::Approver,
        Role::FleetManager,
        Role::PayrollManager,
        Role::MileageController,
        Role::User,
    ];

    /// Parse a wire role. Unknown values degrade to `Role::User`.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "admin" => Role::Admin,
            "gestor_servicio" => Role::ServiceManager,
            "gestor_planillas" => Role::PayrollFormManager,
            "liquidador" => Role::SettlementClerk,
            "facturador" => Role::Biller,
            "aprobador" => Role::Approver,
            "gestor_flota" => Role::FleetManager,
            "gestor_nomina" => Role::PayrollManager,
            "kilometraje" => Role::MileageController,
            _ => Role::User,
        }
    }

    /// Wire value sent and received by the API
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ServiceManager => "gestor_servicio",
            Role::PayrollFormManager => "gestor_planillas",
            Role::SettlementClerk => "liquidador",
            Role::Biller => "facturador",
            Role::Approver => "aprobador",
            Role::FleetManager => "gestor_flota",
            Role::PayrollManager => "gestor_nomina",
            Role::MileageController => "kilometraje",
            Role::User => "usuario",
        }
    }

    /// Get the display label for this role.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrador",
            Role::ServiceManager => "Gestor de Servicios",
            Role::PayrollFormManager => "Gestor de Planillas",
            Role::SettlementClerk => "Liquidador",
            Role::Biller => "Facturador",
            Role::Approver => "Aprobador",
            Role::FleetManager => "Gestor de Flota",
            Role::PayrollManager => "Gestor de Nómina",
            Role::MileageController => "Control de Kilometraje",
            Role::User => "Usuario",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::parse(&s)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Label for a raw role string, falling back to the generic user label.
pub fn role_label(role: &str) -> &'static str {
    Role::parse(role).label()
}

/// Named capability gating access to a downstream system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Admin,
    Fleet,
    Payroll,
    Mileage,
}

impl Capability {
    /// Parse a capability name. Accepts the wire keys and English aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "admin" => Some(Capability::Admin),
            "flota" | "fleet" => Some(Capability::Fleet),
            "nomina" | "nómina" | "payroll" => Some(Capability::Payroll),
            "kilometraje" | "mileage" => Some(Capability::Mileage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Admin => "admin",
            Capability::Fleet => "flota",
            Capability::Payroll => "nomina",
            Capability::Mileage => "kilometraje",
        }
    }
}

/// Permission flags carried by an identity.
///
/// Missing keys read as `false`; keys outside the known set are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Permissions {
    #[serde(rename = "flota", default)]
    pub fleet: bool,
    #[serde(rename = "nomina", default)]
    pub payroll: bool,
    #[serde(default)]
    pub admin: bool,
    #[serde(rename = "kilometraje", default)]
    pub mileage: bool,
}

impl Permissions {
    pub fn get(&self, capability: Capability) -> bool {
        match capability {
            Capability::Admin => self.admin,
            Capability::Fleet => self.fleet,
            Capability::Payroll => self.payroll,
            Capability::Mileage => self.mileage,
        }
    }
}

/// Authenticated user's profile record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Identity {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "correo")]
    pub email: String,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub role: Role,
    #[serde(rename = "permisos", default)]
    pub permissions: Permissions,
    #[serde(rename = "ultimo_acceso", default, skip_serializing_if = "Option::is_none")]
    pub last_access: Option<String>,
}

impl Identity {
    /// Admin role implies every capability; otherwise the flag decides.
    pub fn has(&self, capability: Capability) -> bool {
        self.role.is_admin() || self.permissions.get(capability)
    }

    /// Capability check by name. Unknown names are `false` unless admin.
    pub fn can(&self, name: &str) -> bool {
        if self.role.is_admin() {
            return true;
        }
        Capability::parse(name)
            .map(|c| self.permissions.get(c))
            .unwrap_or(false)
    }
}

/// Partial profile sent to the update endpoint. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(rename = "nombre", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "correo", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "telefono", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role, permissions: Permissions) -> Identity {
        Identity {
            id: "u1".to_string(),
            name: "Ana Gómez".to_string(),
            email: "ana@example.com".to_string(),
            phone: None,
            role,
            permissions,
            last_access: None,
        }
    }

    #[test]
    fn test_role_parse_known() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), role);
        }
    }

    #[test]
    fn test_role_unknown_falls_back_to_user() {
        assert_eq!(Role::parse("superuser"), Role::User);
        assert_eq!(Role::parse(""), Role::User);
        assert_eq!(Role::parse("ADMIN"), Role::User);
        assert_eq!(role_label("root"), "Usuario");
        assert_eq!(role_label("gestor_flota"), "Gestor de Flota");
    }

    #[test]
    fn test_identity_deserializes_wire_shape() {
        let json = r#"{
            "id": "66f1",
            "nombre": "Carlos Ruiz",
            "correo": "carlos@example.com",
            "telefono": "3001234567",
            "role": "gestor_nomina",
            "permisos": {"flota": false, "nomina": true, "admin": false, "reportes": true},
            "ultimo_acceso": "2024-03-01T10:15:00Z"
        }"#;
        let user: Identity = serde_json::from_str(json).expect("identity should parse");
        assert_eq!(user.role, Role::PayrollManager);
        assert!(user.permissions.payroll);
        assert!(!user.permissions.fleet);
        assert_eq!(user.phone.as_deref(), Some("3001234567"));
    }

    #[test]
    fn test_identity_unknown_role_and_missing_permissions() {
        let json = r#"{"_id": "x", "nombre": "N", "correo": "n@x.com", "role": "auditor", "permisos": {}}"#;
        let user: Identity = serde_json::from_str(json).expect("identity should parse");
        assert_eq!(user.id, "x");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.permissions, Permissions::default());
    }

    #[test]
    fn test_role_serializes_to_wire_value() {
        let json = serde_json::to_string(&Role::SettlementClerk).expect("serialize");
        assert_eq!(json, r#""liquidador""#);
    }

    #[test]
    fn test_admin_role_can_anything() {
        let admin = identity(Role::Admin, Permissions::default());
        assert!(admin.can("admin"));
        assert!(admin.can("flota"));
        assert!(admin.can("does-not-exist"));
        assert!(admin.has(Capability::Mileage));
    }

    #[test]
    fn test_capability_lookup_for_regular_user() {
        let user = identity(
            Role::User,
            Permissions {
                fleet: true,
                ..Permissions::default()
            },
        );
        assert!(user.can("flota"));
        assert!(user.can("fleet"));
        assert!(!user.can("nomina"));
        assert!(!user.can("unknown"));
    }

    #[test]
    fn test_profile_update_omits_unset_fields() {
        let update = ProfileUpdate {
            phone: Some("555".to_string()),
            ..ProfileUpdate::default()
        };
        let json = serde_json::to_value(&update).expect("serialize");
        assert_eq!(json, serde_json::json!({"telefono": "555"}));
    }
}
