//! Role-based view gating.
//!
//! One table says what each role can do; every view names the capability it
//! needs. Nothing here knows about sessions: callers hand in whatever role the
//! identity provider reported.

use serde::{Deserialize, Serialize};

use crate::errors::Error;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Doctor,
    Patient,
    /// Hospital reception
    Hospital,
    Pharmacist,
    LabTechnician,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Doctor,
        Role::Patient,
        Role::Hospital,
        Role::Pharmacist,
        Role::LabTechnician,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Patient => "patient",
            Role::Hospital => "hospital",
            Role::Pharmacist => "pharmacist",
            Role::LabTechnician => "lab_technician",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        for (role, capabilities) in PERMISSIONS {
            if role == self {
                return capabilities;
            }
        }
        &[]
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Where a freshly signed-in user lands.
    pub fn landing_view(&self) -> View {
        match self {
            Role::Doctor => View::DoctorDashboard,
            Role::Patient => View::PatientDashboard,
            Role::Hospital => View::HospitalDashboard,
            Role::Pharmacist => View::PharmacyDashboard,
            Role::LabTechnician => View::LabDashboard,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s.trim())
            .ok_or_else(|| Error::validation(format!("Unknown role: {s}")))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    DoctorWorkspace,
    PatientWorkspace,
    ViewReports,
    HospitalAdministration,
    DispensePrescriptions,
    ProcessLabTests,
    ViewInvoices,
}

/// Role → capabilities. The only place access rules live.
const PERMISSIONS: &[(Role, &[Capability])] = &[
    (
        Role::Doctor,
        &[Capability::DoctorWorkspace, Capability::ViewReports],
    ),
    (
        Role::Patient,
        &[
            Capability::PatientWorkspace,
            Capability::ViewReports,
            Capability::ViewInvoices,
        ],
    ),
    (
        Role::Hospital,
        &[Capability::HospitalAdministration, Capability::ViewInvoices],
    ),
    (
        Role::Pharmacist,
        &[Capability::DispensePrescriptions, Capability::ViewInvoices],
    ),
    (Role::LabTechnician, &[Capability::ProcessLabTests]),
];

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// Sign-in screen, open to everyone
    Entry,
    DoctorDashboard,
    DoctorProfile,
    DoctorPatientDetail,
    ReportViewer,
    PatientDashboard,
    PatientHistory,
    PatientReports,
    PatientAllergies,
    PatientProfile,
    HospitalDashboard,
    PatientRegistration,
    StaffManagement,
    AddDoctor,
    AddStaff,
    Appointments,
    Billing,
    BillingViewAll,
    ScheduleAppointment,
    PharmacyDashboard,
    LabDashboard,
    Invoice,
}

impl View {
    pub const ALL: [View; 22] = [
        View::Entry,
        View::DoctorDashboard,
        View::DoctorProfile,
        View::DoctorPatientDetail,
        View::ReportViewer,
        View::PatientDashboard,
        View::PatientHistory,
        View::PatientReports,
        View::PatientAllergies,
        View::PatientProfile,
        View::HospitalDashboard,
        View::PatientRegistration,
        View::StaffManagement,
        View::AddDoctor,
        View::AddStaff,
        View::Appointments,
        View::Billing,
        View::BillingViewAll,
        View::ScheduleAppointment,
        View::PharmacyDashboard,
        View::LabDashboard,
        View::Invoice,
    ];

    /// Route pattern; `:name` segments match any single path segment.
    pub fn path(&self) -> &'static str {
        match self {
            View::Entry => "/",
            View::DoctorDashboard => "/doctor/dashboard",
            View::DoctorProfile => "/doctor/profile",
            View::DoctorPatientDetail => "/doctor/patient/:patientId",
            View::ReportViewer => "/report/:reportId",
            View::PatientDashboard => "/patient/dashboard",
            View::PatientHistory => "/patient/history",
            View::PatientReports => "/patient/reports",
            View::PatientAllergies => "/patient/allergies",
            View::PatientProfile => "/patient/profile",
            View::HospitalDashboard => "/hospital/dashboard",
            View::PatientRegistration => "/registration",
            View::StaffManagement => "/hospital/staff-management",
            View::AddDoctor => "/hospital/add-doctor",
            View::AddStaff => "/hospital/add-staff",
            View::Appointments => "/hospital/appointments",
            View::Billing => "/hospital/billing",
            View::BillingViewAll => "/hospital/billing/view-all",
            View::ScheduleAppointment => "/hospital/schedule-appointment",
            View::PharmacyDashboard => "/pharmacy/dashboard",
            View::LabDashboard => "/lab/dashboard",
            View::Invoice => "/billing/invoice/:invoiceId",
        }
    }

    /// `None` for the entry view.
    pub fn required_capability(&self) -> Option<Capability> {
        use Capability::*;
        match self {
            View::Entry => None,
            View::DoctorDashboard | View::DoctorProfile | View::DoctorPatientDetail => {
                Some(DoctorWorkspace)
            }
            View::ReportViewer => Some(ViewReports),
            View::PatientDashboard
            | View::PatientHistory
            | View::PatientReports
            | View::PatientAllergies
            | View::PatientProfile => Some(PatientWorkspace),
            View::HospitalDashboard
            | View::PatientRegistration
            | View::StaffManagement
            | View::AddDoctor
            | View::AddStaff
            | View::Appointments
            | View::Billing
            | View::BillingViewAll
            | View::ScheduleAppointment => Some(HospitalAdministration),
            View::PharmacyDashboard => Some(DispensePrescriptions),
            View::LabDashboard => Some(ProcessLabTests),
            View::Invoice => Some(ViewInvoices),
        }
    }

    /// Roles that may enter, derived from the permission table.
    pub fn required_roles(&self) -> Vec<Role> {
        match self.required_capability() {
            None => Role::ALL.to_vec(),
            Some(capability) => Role::ALL
                .into_iter()
                .filter(|role| role.can(capability))
                .collect(),
        }
    }

    pub fn from_path(path: &str) -> Option<View> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        View::ALL
            .into_iter()
            .find(|view| path_matches(view.path(), path))
    }
}

fn path_matches(pattern: &str, path: &str) -> bool {
    let trimmed = path.trim_end_matches('/');
    let path = if trimmed.is_empty() { "/" } else { trimmed };

    let mut expected = pattern.split('/');
    let mut actual = path.split('/');
    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return true,
            (Some(p), Some(a)) if p.starts_with(':') => {
                if a.is_empty() {
                    return false;
                }
            }
            (Some(p), Some(a)) if p == a => {}
            _ => return false,
        }
    }
}

/// `true` when `role` is one of `required_roles`.
pub fn is_allowed(role: Role, required_roles: &[Role]) -> bool {
    required_roles.contains(&role)
}

/// Identity handed over by the external identity provider after sign-in.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct SessionUser {
    pub user_id: String,
    pub role: Role,
}

impl SessionUser {
    /// Validates the raw `{ role, userId }` pair from the identity provider.
    pub fn from_profile(role: &str, user_id: &str) -> Result<Self, Error> {
        let user_id = user_id.trim();
        let mut messages = Vec::new();
        if user_id.is_empty() {
            messages.push("User id is required".to_string());
        }
        let role = role.parse::<Role>();
        if let Err(Error::Validation { messages: role_messages }) = &role {
            messages.extend(role_messages.iter().cloned());
        }
        Error::check(messages)?;

        Ok(Self {
            user_id: user_id.to_string(),
            role: role?,
        })
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "decision", content = "view", rename_all = "snake_case")]
pub enum RouteDecision {
    Enter(View),
    Redirect(View),
}

/// Decides whether `user` may open `path`; anything else goes back to the entry view.
pub fn resolve(user: Option<&SessionUser>, path: &str) -> RouteDecision {
    let Some(view) = View::from_path(path) else {
        return RouteDecision::Redirect(View::Entry);
    };
    if view == View::Entry {
        return RouteDecision::Enter(View::Entry);
    }
    match user {
        Some(user) if is_allowed(user.role, &view.required_roles()) => RouteDecision::Enter(view),
        _ => RouteDecision::Redirect(View::Entry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> SessionUser {
        SessionUser {
            user_id: "u-1".to_string(),
            role,
        }
    }

    #[test]
    fn roles_use_wire_names() {
        assert_eq!("lab_technician".parse::<Role>().unwrap(), Role::LabTechnician);
        assert_eq!(serde_json::to_string(&Role::Hospital).unwrap(), "\"hospital\"");
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn is_allowed_checks_membership() {
        assert!(is_allowed(Role::Pharmacist, &[Role::Hospital, Role::Pharmacist]));
        assert!(!is_allowed(Role::Doctor, &[Role::Patient]));
        assert!(!is_allowed(Role::Doctor, &[]));
    }

    #[test]
    fn shared_views_derive_roles_from_table() {
        assert_eq!(View::ReportViewer.required_roles(), vec![Role::Doctor, Role::Patient]);
        assert_eq!(
            View::Invoice.required_roles(),
            vec![Role::Patient, Role::Hospital, Role::Pharmacist]
        );
        assert_eq!(View::PharmacyDashboard.required_roles(), vec![Role::Pharmacist]);
    }

    #[test]
    fn paths_with_parameters_resolve() {
        assert_eq!(View::from_path("/doctor/patient/P-1001"), Some(View::DoctorPatientDetail));
        assert_eq!(View::from_path("/billing/invoice/INV-1?print=1"), Some(View::Invoice));
        assert_eq!(View::from_path("/pharmacy/dashboard/"), Some(View::PharmacyDashboard));
        assert_eq!(View::from_path("/doctor/patient/"), None);
        assert_eq!(View::from_path("/nowhere"), None);
    }

    #[test]
    fn unauthenticated_and_unauthorised_users_are_redirected() {
        assert_eq!(
            resolve(None, "/pharmacy/dashboard"),
            RouteDecision::Redirect(View::Entry)
        );
        assert_eq!(
            resolve(Some(&user(Role::Doctor)), "/pharmacy/dashboard"),
            RouteDecision::Redirect(View::Entry)
        );
        assert_eq!(
            resolve(Some(&user(Role::Pharmacist)), "/pharmacy/dashboard"),
            RouteDecision::Enter(View::PharmacyDashboard)
        );
        assert_eq!(
            resolve(Some(&user(Role::Pharmacist)), "/unknown"),
            RouteDecision::Redirect(View::Entry)
        );
        assert_eq!(resolve(None, "/"), RouteDecision::Enter(View::Entry));
    }

    #[test]
    fn every_landing_view_is_enterable_by_its_role() {
        for role in Role::ALL {
            let landing = role.landing_view();
            assert_eq!(
                resolve(Some(&user(role)), landing.path()),
                RouteDecision::Enter(landing)
            );
        }
    }

    #[test]
    fn session_user_rejects_bad_profiles() {
        let err = SessionUser::from_profile("superuser", " ").unwrap_err();
        assert_eq!(
            err,
            Error::Validation {
                messages: vec![
                    "User id is required".to_string(),
                    "Unknown role: superuser".to_string(),
                ]
            }
        );
        assert_eq!(
            SessionUser::from_profile("pharmacist", "ph-7").unwrap(),
            user_with_id(Role::Pharmacist, "ph-7")
        );
    }

    fn user_with_id(role: Role, user_id: &str) -> SessionUser {
        SessionUser {
            user_id: user_id.to_string(),
            role,
        }
    }
}
