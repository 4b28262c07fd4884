use askama::Template;
use askama_web::WebTemplate;

#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub(crate) struct LoginTemplate {
    pub(crate) app_name: String,
    pub(crate) error: String,
    pub(crate) email: String,
    pub(crate) next: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub(crate) struct DashboardTemplate {
    pub(crate) app_name: String,
    pub(crate) email: String,
    pub(crate) role: String,
    pub(crate) is_admin: bool,
    pub(crate) unread: usize,
    pub(crate) folders: Vec<FolderCard>,
    pub(crate) inbox: Vec<DocumentRow>,
    pub(crate) outbox: Vec<DocumentRow>,
    pub(crate) trash: Vec<DocumentRow>,
    pub(crate) user_count: usize,
    pub(crate) recent_activity: Vec<ActivityRow>,
}

pub(crate) struct FolderCard {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) document_count: usize,
}

pub(crate) struct DocumentRow {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) folder: String,
    pub(crate) counterpart: String,
    pub(crate) date: String,
    pub(crate) status: &'static str,
    pub(crate) pending: bool,
}

pub(crate) struct ActivityRow {
    pub(crate) user: String,
    pub(crate) action: String,
    pub(crate) target: String,
    pub(crate) date: String,
}
