use async_trait::async_trait;

use crate::jobs::{self, JobPolling};
use crate::menu::Actions;
use crate::model::DeviceMethodInvocation;
use crate::query;
use crate::service::{JobClient, RegistryManager, ServiceClient};
use crate::storage::BlobService;
use crate::twin;
use crate::util::console::{Console, Level};
use crate::util::types::DeviceId;

/// Operator side settings taken from the command line
#[derive(Debug, Clone)]
pub struct Settings {
    pub device_id: DeviceId,
    pub query_page_size: u32,
    pub query_max_pages: u32,
    pub polling: JobPolling,
    pub export_container: String,
    pub export_exclude_keys: bool,
}

/// The menu's actions, run against the hub and storage account
pub struct App {
    pub console: Console,
    pub settings: Settings,
    pub registry: RegistryManager,
    pub service: ServiceClient,
    pub jobs: JobClient,
    pub storage: Option<BlobService>,
}

impl App {
    fn report<T>(&self, res: anyhow::Result<T>) {
        if let Err(e) = res {
            self.console.error(format!("{e:#}"));
        }
    }

    fn storage(&self) -> anyhow::Result<&BlobService> {
        self.storage.as_ref().ok_or_else(|| {
            anyhow::anyhow!("no storage account configured, set --storage-connection-string")
        })
    }

    async fn invoke(&self, method_name: &str) -> anyhow::Result<()> {
        let console = &self.console;
        console.blank();
        console.write(
            format!("Will invoke direct method '{method_name}'..."),
            Level::Invoke,
        );

        let result = self
            .service
            .invoke_device_method(
                &self.settings.device_id,
                &DeviceMethodInvocation::new(method_name),
            )
            .await?;

        console.blank();
        console.write(
            format!("Direct method result status: {}, payload:", result.status),
            Level::Invoke,
        );
        console.write(result.payload_json(), Level::Invoke);
        Ok(())
    }

    async fn sas(&self, container: &str) -> anyhow::Result<()> {
        let uri = self.storage()?.container_uri_with_sas(container).await?;
        self.console
            .write(format!("Blob URI with SAS: {uri}"), Level::Operator);
        Ok(())
    }
}

#[async_trait]
impl Actions for App {
    async fn update_twin(&self) {
        let res = twin::update_twin(&self.registry, &self.settings.device_id, &self.console).await;
        self.report(res);
    }

    async fn query_devices(&self, query: &str) {
        let mut pages = self
            .registry
            .create_query(query, self.settings.query_page_size);
        let res = query::query_devices(
            &mut pages,
            query,
            self.settings.query_max_pages,
            &self.console,
        )
        .await;
        self.report(res);
    }

    async fn invoke_method(&self, method_name: &str) {
        let res = self.invoke(method_name).await;
        self.report(res);
    }

    async fn export_devices(&self) {
        let res = match self.storage() {
            Ok(storage) => jobs::export_devices(
                &self.registry,
                storage,
                &self.settings.export_container,
                self.settings.export_exclude_keys,
                self.settings.polling,
                &self.console,
            )
            .await
            .map(drop),
            Err(e) => Err(e),
        };
        self.report(res);
    }

    async fn start_update_job(&self, query_condition: &str) {
        let res = jobs::start_update_job(
            &self.jobs,
            query_condition,
            self.settings.polling,
            &self.console,
        )
        .await;
        self.report(res);
    }

    async fn container_sas(&self, container: &str) {
        let res = self.sas(container).await;
        self.report(res);
    }
}
