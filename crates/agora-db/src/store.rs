use agora_types::PermissionCode;
use agora_types::models::{Channel, Identity, NewMessage, Permission, RoleRef, StoredMessage};
use agora_types::store::{ChannelStore, IdentityStore};
use anyhow::Result;

use crate::Database;

impl IdentityStore for Database {
    fn find_identity_by_handle(&self, handle: &str) -> Result<Option<Identity>> {
        let Some(row) = self.get_user_by_username(handle)? else {
            return Ok(None);
        };

        let role = match (row.role_id, row.role_name) {
            (Some(id), Some(name)) => Some(RoleRef { id, name }),
            _ => None,
        };

        Ok(Some(Identity {
            id: row.id,
            handle: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            active: row.active,
            role,
        }))
    }

    fn role_permissions(&self, role_id: i64) -> Result<Vec<Permission>> {
        Ok(self
            .get_role_permissions(role_id)?
            .into_iter()
            .map(|row| Permission {
                code: PermissionCode::new(row.code),
                active: row.active,
            })
            .collect())
    }
}

impl ChannelStore for Database {
    fn find_channel_by_id(&self, id: i64) -> Result<Option<Channel>> {
        Ok(self.get_channel_by_id(id)?.map(|row| Channel {
            id: row.id,
            name: row.name,
            min_role: row.min_role,
            active: row.active,
        }))
    }

    fn persist_message(&self, message: NewMessage) -> Result<StoredMessage> {
        let created_at = chrono::Utc::now();
        let id = self.insert_message(
            message.channel_id,
            message.author_id,
            &message.content,
            message.kind.as_str(),
            message.attachment_url.as_deref(),
            created_at,
        )?;

        Ok(StoredMessage {
            id,
            content: message.content,
            author_id: message.author_id,
            channel_id: message.channel_id,
            kind: message.kind,
            attachment_url: message.attachment_url,
            edited: false,
            created_at,
        })
    }
}
