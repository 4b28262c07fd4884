use crate::app::lock_library;
use crate::audit::PageSize;
use crate::state;
use crate::templates::{self, ActivityRow, DashboardTemplate, DocumentRow, FolderCard};
use crate::types::documents::Document;
use crate::types::users::Session;

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::error;

const RECENT_ACTIVITY: usize = 10;

/// Admin roles get the management view; everyone else their own mail and folders.
pub(crate) async fn dashboard(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
) -> Result<DashboardTemplate, (StatusCode, &'static str)> {
    let library = lock_library(&state)
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "internal error"))?;
    let internal = |err: &dyn std::fmt::Display| {
        error!(error = %err, "failed to render dashboard");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    };

    let is_admin = session.is_admin();
    let folders = library
        .folders(&session, None)
        .map_err(|err| internal(&err))?
        .into_iter()
        .map(|listing| FolderCard {
            name: listing.folder.name,
            description: listing.folder.description,
            document_count: listing.document_count,
        })
        .collect();
    let inbox = library
        .inbox(&session)
        .map_err(|err| internal(&err))?
        .iter()
        .map(|doc| document_row(doc, doc.sender.clone(), doc.created_at))
        .collect();
    let outbox = library
        .outbox(&session)
        .map_err(|err| internal(&err))?
        .iter()
        .map(|doc| {
            let to = doc.recipient.clone().unwrap_or_else(|| "Everyone".to_string());
            document_row(doc, to, doc.created_at)
        })
        .collect();
    let trash = library
        .trash(&session)
        .map_err(|err| internal(&err))?
        .iter()
        .map(|doc| document_row(doc, doc.sender.clone(), doc.trashed_at.unwrap_or(doc.created_at)))
        .collect();
    let unread = library
        .unread_count(&session)
        .map_err(|err| internal(&err))?;

    let (user_count, recent_activity) = if is_admin {
        let users = library.users(&session, None).map_err(|err| internal(&err))?;
        let activity = library
            .audit_logs(&session, None, 1, PageSize::Items(RECENT_ACTIVITY))
            .map_err(|err| internal(&err))?
            .items
            .into_iter()
            .map(|entry| ActivityRow {
                user: entry.user,
                action: entry.action,
                target: entry.target,
                date: format_date(entry.date),
            })
            .collect();
        (users.len(), activity)
    } else {
        (0, Vec::new())
    };

    Ok(templates::DashboardTemplate {
        app_name: state.config.app_name.clone(),
        email: session.email.clone(),
        role: session.role.clone(),
        is_admin,
        unread,
        folders,
        inbox,
        outbox,
        trash,
        user_count,
        recent_activity,
    })
}

fn document_row(doc: &Document, counterpart: String, date: OffsetDateTime) -> DocumentRow {
    DocumentRow {
        id: doc.id.clone(),
        title: doc.title.clone(),
        folder: doc.folder.clone(),
        counterpart,
        date: format_date(date),
        status: doc.status.label(),
        pending: doc.pending_approval,
    }
}

fn format_date(date: OffsetDateTime) -> String {
    date.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_default()
}
