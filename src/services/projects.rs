//! Projects (lists) and folders.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use super::{check_batch_errors, first_in, list_of, require_v2};
use crate::api::{ApiVersion, Endpoints, TickTickClient};
use crate::domain::{Folder, NewProject, Project, ProjectData, ProjectPatch};
use crate::error::{Result, TickTickError};

#[derive(Debug, Clone)]
pub struct ProjectService {
    client: Arc<TickTickClient>,
}

impl ProjectService {
    pub fn new(client: Arc<TickTickClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self, include_archived: bool) -> Result<Vec<Project>> {
        let projects: Vec<Project> = list_of(self.client.get(ApiVersion::V1, Endpoints::projects()).await?)?;
        Ok(projects
            .into_iter()
            .filter(|p| include_archived || !p.is_archived())
            .collect())
    }

    pub async fn get(&self, project_id: &str) -> Result<Project> {
        let value = self.client.get(ApiVersion::V1, &Endpoints::project(project_id)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// The project together with its open tasks.
    pub async fn data(&self, project_id: &str) -> Result<ProjectData> {
        let value = self
            .client
            .get(ApiVersion::V1, &Endpoints::project_data(project_id))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn create(&self, new_project: &NewProject) -> Result<Project> {
        let payload = new_project.to_payload()?;
        let value = self.client.post(ApiVersion::V1, Endpoints::projects(), &payload).await?;
        let project: Project = serde_json::from_value(value)?;
        log::info!("Created project {} ({})", project.name, project.id);
        Ok(project)
    }

    /// Update through the v2 batch endpoint.
    pub async fn update(&self, project_id: &str, patch: &ProjectPatch) -> Result<Project> {
        require_v2(&self.client, "Project update")?;
        if patch.is_empty() {
            return Err(TickTickError::Validation("no fields to update".to_string()));
        }
        let payload = json!({ "update": [patch.to_payload(project_id)?] });
        let response = self
            .client
            .post(ApiVersion::V2, Endpoints::batch_project(), &payload)
            .await?;
        check_batch_errors(&response)?;
        match first_in(&response, "update") {
            Some(project) => Ok(project),
            None => self.find(project_id).await,
        }
    }

    pub async fn delete(&self, project_id: &str) -> Result<()> {
        self.client
            .delete(ApiVersion::V1, &Endpoints::project(project_id))
            .await?;
        log::info!("Deleted project {}", project_id);
        Ok(())
    }

    pub async fn set_archived(&self, project_id: &str, archived: bool) -> Result<()> {
        require_v2(&self.client, "Project archiving")?;
        let payload = json!({ "update": [{ "id": project_id, "closed": archived }] });
        let response = self
            .client
            .post(ApiVersion::V2, Endpoints::batch_project(), &payload)
            .await?;
        check_batch_errors(&response)
    }

    /// Look a project up through whichever API is available.
    async fn find(&self, project_id: &str) -> Result<Project> {
        if self.client.has_v1() {
            return self.get(project_id).await;
        }
        let sync = self.client.sync(0).await?;
        let projects: Vec<Project> = list_of(sync.get("projectProfiles").cloned().unwrap_or_default())?;
        projects
            .into_iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| TickTickError::NotFound(format!("Project {} not found", project_id)))
    }

    pub async fn folders(&self) -> Result<Vec<Folder>> {
        require_v2(&self.client, "Folders")?;
        let sync = self.client.sync(0).await?;
        list_of(sync.get("projectGroups").cloned().unwrap_or_default())
    }

    pub async fn create_folder(&self, name: &str) -> Result<Folder> {
        require_v2(&self.client, "Folders")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(TickTickError::Validation("folder name is required".to_string()));
        }
        let payload = json!({ "add": [{ "name": name, "listType": "group" }] });
        let response = self
            .client
            .post(ApiVersion::V2, Endpoints::batch_project_group(), &payload)
            .await?;
        check_batch_errors(&response)?;
        if let Some(folder) = first_in(&response, "add") {
            return Ok(folder);
        }
        self.folders()
            .await?
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| TickTickError::NotFound(format!("Folder '{}' was not created", name)))
    }

    /// Rename and/or reorder a folder.
    pub async fn update_folder(&self, folder_id: &str, name: Option<&str>, sort_order: Option<i64>) -> Result<Folder> {
        require_v2(&self.client, "Folders")?;
        let name = name.map(str::trim);
        if name.is_some_and(str::is_empty) {
            return Err(TickTickError::Validation("folder name cannot be empty".to_string()));
        }
        if name.is_none() && sort_order.is_none() {
            return Err(TickTickError::Validation("nothing to update".to_string()));
        }

        let mut change = Map::new();
        change.insert("id".to_string(), json!(folder_id));
        if let Some(name) = name {
            change.insert("name".to_string(), json!(name));
        }
        if let Some(sort_order) = sort_order {
            change.insert("sortOrder".to_string(), json!(sort_order));
        }
        let response = self
            .client
            .post(
                ApiVersion::V2,
                Endpoints::batch_project_group(),
                &json!({ "update": [Value::Object(change)] }),
            )
            .await?;
        check_batch_errors(&response)?;
        if let Some(folder) = first_in::<Folder>(&response, "update") {
            return Ok(folder);
        }
        self.folders()
            .await?
            .into_iter()
            .find(|f| f.id == folder_id)
            .ok_or_else(|| TickTickError::NotFound(format!("Folder {} not found", folder_id)))
    }

    pub async fn delete_folder(&self, folder_id: &str) -> Result<()> {
        require_v2(&self.client, "Folders")?;
        let response = self
            .client
            .post(
                ApiVersion::V2,
                Endpoints::batch_project_group(),
                &json!({ "delete": [folder_id] }),
            )
            .await?;
        check_batch_errors(&response)
    }
}
