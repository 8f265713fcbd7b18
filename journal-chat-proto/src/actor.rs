//! Actors (addressable participants) and their roles.

use serde::{Deserialize, Serialize};

/// Server-assigned identifier of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(u64);

impl ActorId {
    /// Creates an actor identifier from its server-assigned value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of an actor. Closed set; drives the dashboard view table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A regular user (article author).
    #[serde(rename = "USER")]
    User,
    /// A journal administrator.
    #[serde(rename = "ADMIN")]
    Admin,
    /// An administrator who can also manage other administrators.
    #[serde(rename = "SUPERADMIN")]
    SuperAdmin,
}

/// Dashboard views an actor can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardView {
    /// Landing page of the dashboard.
    Home,
    /// Journal management.
    Journals,
    /// Article submission or review.
    Articles,
    /// Category management.
    Categories,
    /// Author records.
    Authors,
    /// Account management of users and admins.
    UserControl,
    /// The actor's own profile.
    Profile,
    /// Author/admin conversations.
    Chat,
    /// Account settings.
    Settings,
}

const USER_VIEWS: &[DashboardView] = &[
    DashboardView::Home,
    DashboardView::Chat,
    DashboardView::Articles,
    DashboardView::Authors,
    DashboardView::Profile,
];

const ADMIN_VIEWS: &[DashboardView] = &[
    DashboardView::Home,
    DashboardView::Journals,
    DashboardView::Articles,
    DashboardView::Categories,
    DashboardView::Authors,
    DashboardView::UserControl,
    DashboardView::Profile,
    DashboardView::Chat,
    DashboardView::Settings,
];

const SUPERADMIN_VIEWS: &[DashboardView] = &[
    DashboardView::Home,
    DashboardView::UserControl,
    DashboardView::Chat,
    DashboardView::Settings,
];

impl Role {
    /// Whether this role belongs to the platform staff (admin or super-admin).
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }

    /// Dashboard views reachable for this role.
    #[must_use]
    pub const fn allowed_views(self) -> &'static [DashboardView] {
        match self {
            Self::User => USER_VIEWS,
            Self::Admin => ADMIN_VIEWS,
            Self::SuperAdmin => SUPERADMIN_VIEWS,
        }
    }

    /// Whether `view` is reachable for this role.
    #[must_use]
    pub fn can_access(self, view: DashboardView) -> bool {
        self.allowed_views().contains(&view)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "USER"),
            Self::Admin => write!(f, "ADMIN"),
            Self::SuperAdmin => write!(f, "SUPERADMIN"),
        }
    }
}

/// An addressable participant, as returned by the user endpoints.
///
/// Reachability is not part of the actor; it comes from presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// Server-assigned identifier.
    pub id: ActorId,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Login name, also the display fallback.
    pub username: String,
    /// Role of the actor.
    pub role: Role,
    /// Contact e-mail, if exposed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Avatar URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Actor {
    /// Human-readable name: "First Last", or the username when both are blank.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}
