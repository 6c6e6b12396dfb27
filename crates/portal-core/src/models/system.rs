use serde::Serialize;

use super::identity::{Capability, Identity, Role};
use crate::auth::Navigation;
use crate::config::SystemUrls;

/// External systems reachable from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum System {
    Payroll,
    Services,
    Fleet,
    Companies,
    Drivers,
    Mileage,
}

impl System {
    /// Dashboard display order
    pub const ALL: [System; 6] = [
        System::Payroll,
        System::Services,
        System::Fleet,
        System::Companies,
        System::Drivers,
        System::Mileage,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            System::Payroll => "Nómina",
            System::Services => "Servicios",
            System::Fleet => "Flota",
            System::Companies => "Empresas",
            System::Drivers => "Conductores",
            System::Mileage => "Kilometraje",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            System::Payroll => "Gestión de nóminas y pagos",
            System::Services => "Control de servicios y planillas",
            System::Fleet => "Administración de vehículos",
            System::Companies => "Gestión de empresas y clientes",
            System::Drivers => "Base de datos de conductores",
            System::Mileage => "Control de kilometraje de vehículos",
        }
    }

    /// Parse a system name as typed by a user (title or English name).
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        if lower == "nomina" {
            return Some(System::Payroll);
        }
        System::ALL.into_iter().find(|sys| {
            sys.title().to_lowercase() == lower || sys.name() == lower
        })
    }

    fn name(&self) -> &'static str {
        match self {
            System::Payroll => "payroll",
            System::Services => "services",
            System::Fleet => "fleet",
            System::Companies => "companies",
            System::Drivers => "drivers",
            System::Mileage => "mileage",
        }
    }

    /// Whether this identity may open the system.
    pub fn is_available(&self, user: &Identity) -> bool {
        if user.role.is_admin() {
            return true;
        }
        let perms = &user.permissions;
        match self {
            System::Payroll => perms.get(Capability::Payroll) || user.role == Role::PayrollManager,
            System::Services => matches!(
                user.role,
                Role::ServiceManager | Role::PayrollFormManager | Role::MileageController
            ),
            System::Fleet | System::Drivers => {
                perms.get(Capability::Fleet) || user.role == Role::FleetManager
            }
            System::Companies => perms.get(Capability::Admin),
            System::Mileage => {
                user.role == Role::MileageController || perms.get(Capability::Mileage)
            }
        }
    }

    /// Configured destination origin, if any.
    pub fn destination<'a>(&self, urls: &'a SystemUrls) -> Option<&'a str> {
        let url = match self {
            System::Payroll => urls.nomina.as_deref(),
            System::Services => urls.servicios.as_deref(),
            System::Fleet => urls.flota.as_deref(),
            System::Companies => urls.empresas.as_deref(),
            System::Drivers => urls.conductores.as_deref(),
            System::Mileage => urls.kilometraje.as_deref().or(urls.servicios.as_deref()),
        };
        url.filter(|u| !u.trim().is_empty())
    }
}

impl std::fmt::Display for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// One dashboard card: a system, whether the user may open it, and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SystemCard {
    pub system: System,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub title: &'static str,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub description: &'static str,
    pub available: bool,
    pub url: Option<String>,
}

impl SystemCard {
    pub fn new(system: System, user: &Identity, urls: &SystemUrls) -> Self {
        Self {
            system,
            title: system.title(),
            description: system.description(),
            available: system.is_available(user),
            url: system.destination(urls).map(str::to_string),
        }
    }

    /// External navigation for this card. `None` when the card is locked or
    /// its destination is not configured.
    pub fn open(&self) -> Option<Navigation> {
        if !self.available {
            return None;
        }
        self.url.clone().map(Navigation::External)
    }

    pub fn status_label(&self) -> &'static str {
        if self.available {
            "✓ Disponible"
        } else {
            "✕ Sin acceso"
        }
    }
}

/// Cards for every system, in dashboard order.
pub fn dashboard_cards(user: &Identity, urls: &SystemUrls) -> Vec<SystemCard> {
    System::ALL
        .into_iter()
        .map(|system| SystemCard::new(system, user, urls))
        .collect()
}
