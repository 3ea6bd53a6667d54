//! Operations that exist for one node kind only

use chrono::Utc;
use uuid::Uuid;

use crate::entity::department;
use crate::entity::position::{self, PositionFilter};
use crate::error::{AppError, AppResult, OptionExt};

use super::{EmployeeLookup, HierarchyService};

impl HierarchyService<position::Model> {
    /// Active positions in one listing group, in display order.
    ///
    /// With `parent_id`, only direct children of that position.
    pub async fn list_by_filter(
        &self,
        filter: PositionFilter,
        parent_id: Option<Uuid>,
    ) -> AppResult<Vec<position::Model>> {
        let candidates = match parent_id {
            Some(id) => self.list_children(id).await?,
            None => self.list_all().await?,
        };

        Ok(candidates
            .into_iter()
            .filter(|p| p.is_active && p.filter_by == filter)
            .collect())
    }
}

impl HierarchyService<department::Model> {
    /// Set or clear the managing employee of a department
    pub async fn assign_manager(
        &self,
        id: Uuid,
        manager_id: Option<Uuid>,
        employees: &dyn EmployeeLookup,
    ) -> AppResult<department::Model> {
        if let Some(manager) = manager_id {
            if !employees.employee_exists(manager).await? {
                return Err(AppError::NotFound(format!(
                    "Employee not found with id: {}",
                    manager
                )));
            }
        }

        let saved = self
            .write_one(&|nodes: &[department::Model]| -> AppResult<department::Model> {
                let mut node = nodes
                    .iter()
                    .find(|n| n.id == id)
                    .cloned()
                    .ok_or_not_found(format!("Department not found with id: {}", id))?;
                node.manager_id = manager_id;
                node.updated_at = Utc::now();
                Ok(node)
            })
            .await?;

        tracing::info!("Department {} manager set to {:?}", id, manager_id);
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::department::DepartmentInput;
    use crate::entity::position::PositionInput;
    use crate::hierarchy::{MemoryTreeStore, MemoryUsage};
    use std::sync::Arc;

    fn job(name: &str, parent_id: Option<Uuid>, filter: PositionFilter, active: bool) -> PositionInput {
        PositionInput {
            name: name.to_string(),
            parent_id,
            filter_by: Some(filter),
            is_active: Some(active),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_list_by_filter() {
        let service: HierarchyService<position::Model> = HierarchyService::new(
            Arc::new(MemoryTreeStore::<position::Model>::new()),
            Arc::new(MemoryUsage::new()),
        );
        let office = service
            .create(job("Head office", None, PositionFilter::OrgUnit, true))
            .await
            .unwrap();
        let chief = service
            .create(job("Chief", Some(office.id), PositionFilter::JobTitle, true))
            .await
            .unwrap();
        service
            .create(job("Former chief", Some(office.id), PositionFilter::JobTitle, false))
            .await
            .unwrap();
        let clerk = service
            .create(job("Clerk", None, PositionFilter::JobTitle, true))
            .await
            .unwrap();
        service
            .create(job("Unsorted", None, PositionFilter::Unassigned, true))
            .await
            .unwrap();

        let titles: Vec<Uuid> = service
            .list_by_filter(PositionFilter::JobTitle, None)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(titles.len(), 2);
        assert!(titles.contains(&chief.id) && titles.contains(&clerk.id));

        let under: Vec<Uuid> = service
            .list_by_filter(PositionFilter::JobTitle, Some(office.id))
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(under, vec![chief.id]);

        let result = service.list_by_filter(PositionFilter::OrgUnit, Some(Uuid::new_v4())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_assign_manager() {
        let usage = Arc::new(MemoryUsage::new());
        let service: HierarchyService<department::Model> = HierarchyService::new(
            Arc::new(MemoryTreeStore::<department::Model>::new()),
            usage.clone(),
        );
        let sales = service
            .create(DepartmentInput {
                name: "Sales".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let manager = Uuid::new_v4();
        usage.add_employee(manager).await;

        let updated = service.assign_manager(sales.id, Some(manager), usage.as_ref()).await.unwrap();
        assert_eq!(updated.manager_id, Some(manager));
        assert_eq!(service.get(sales.id).await.unwrap().manager_id, Some(manager));

        let result = service.assign_manager(sales.id, Some(Uuid::new_v4()), usage.as_ref()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = service.assign_manager(Uuid::new_v4(), None, usage.as_ref()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let cleared = service.assign_manager(sales.id, None, usage.as_ref()).await.unwrap();
        assert_eq!(cleared.manager_id, None);
    }
}
