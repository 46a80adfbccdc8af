//! App creation and destruction.
//!
//! Creation runs four reversible steps through a [`Pipeline`]:
//!
//! | Step                | Forward                               | Backward                |
//! |---------------------|---------------------------------------|-------------------------|
//! | `insert-app`        | insert the record                     | delete the record       |
//! | `create-bucket`     | create bucket, store credentials env  | destroy the bucket      |
//! | `create-repository` | create the source repository          | remove the repository   |
//! | `provision-backend` | provision units, add router backend   | remove backend, destroy |

use tracing::{debug, info, warn};

use shipyard_action::{Action, Pipeline};
use shipyard_router::RouterError;
use shipyard_state::EnvVar;

use crate::app::{App, PLATFORM_SOURCE, now_secs};
use crate::error::{AppError, AppResult, UnbindFailures};
use crate::platform::Platform;

const INVALID_NAME: &str = "Invalid app name, your app should have at most 63 characters, \
                            containing only lower case letters or numbers, starting with a letter.";

/// State threaded through the creation steps.
struct CreateContext<'a> {
    platform: &'a Platform,
    app: App,
}

struct InsertApp;

impl<'a> Action<CreateContext<'a>, AppError> for InsertApp {
    fn name(&self) -> &str {
        "insert-app"
    }

    fn forward(&self, ctx: &mut CreateContext<'a>) -> AppResult<()> {
        let now = now_secs();
        ctx.app.record.created_at = now;
        ctx.app.record.updated_at = now;
        ctx.platform.store.insert_app(&ctx.app.record)?;
        Ok(())
    }

    fn backward(&self, ctx: &mut CreateContext<'a>) -> AppResult<()> {
        ctx.platform.store.delete_app(ctx.app.name())?;
        Ok(())
    }
}

struct CreateBucket;

impl<'a> Action<CreateContext<'a>, AppError> for CreateBucket {
    fn name(&self) -> &str {
        "create-bucket"
    }

    fn forward(&self, ctx: &mut CreateContext<'a>) -> AppResult<()> {
        let creds = ctx
            .platform
            .storage
            .create_bucket(ctx.app.name())
            .map_err(AppError::collaborator("creating bucket"))?;
        let vars = [
            ("SHIPYARD_S3_BUCKET", creds.bucket.as_str()),
            ("SHIPYARD_S3_ENDPOINT", creds.endpoint.as_str()),
            ("SHIPYARD_S3_ACCESS_KEY_ID", creds.access_key.as_str()),
            ("SHIPYARD_S3_SECRET_KEY", creds.secret_key.as_str()),
        ];
        for (name, value) in vars {
            let env = EnvVar::new(name, value, false);
            ctx.app.record.env.insert(env.name.clone(), env);
        }
        if let Err(err) = ctx.app.save(ctx.platform) {
            // A failed step's own backward never runs.
            if let Err(undo_err) = self.backward(ctx) {
                warn!(app = %ctx.app.name(), error = %undo_err, "could not destroy bucket");
            }
            return Err(err);
        }
        Ok(())
    }

    fn backward(&self, ctx: &mut CreateContext<'a>) -> AppResult<()> {
        ctx.platform
            .storage
            .destroy_bucket(ctx.app.name())
            .map_err(AppError::collaborator("destroying bucket"))
    }
}

struct CreateRepository;

impl<'a> Action<CreateContext<'a>, AppError> for CreateRepository {
    fn name(&self) -> &str {
        "create-repository"
    }

    fn forward(&self, ctx: &mut CreateContext<'a>) -> AppResult<()> {
        ctx.platform
            .repository
            .create(ctx.app.name(), ctx.app.teams())
            .map_err(AppError::collaborator("creating repository"))
    }

    fn backward(&self, ctx: &mut CreateContext<'a>) -> AppResult<()> {
        ctx.platform
            .repository
            .remove(ctx.app.name())
            .map_err(AppError::collaborator("removing repository"))
    }
}

struct ProvisionBackend;

impl<'a> Action<CreateContext<'a>, AppError> for ProvisionBackend {
    fn name(&self) -> &str {
        "provision-backend"
    }

    fn forward(&self, ctx: &mut CreateContext<'a>) -> AppResult<()> {
        let platform = ctx.platform;
        platform
            .provisioner
            .provision(ctx.app.record())
            .map_err(AppError::collaborator("provisioning app"))?;
        if let Err(err) = platform.router.add_backend(ctx.app.name()) {
            // The backend may belong to someone else; only the units are ours.
            if let Err(destroy_err) = platform.provisioner.destroy(ctx.app.record()) {
                warn!(app = %ctx.app.name(), error = %destroy_err, "could not destroy provisioned app");
            }
            return Err(err.into());
        }
        let message = format!("creating app {}", ctx.app.name());
        if let Err(err) = ctx.app.log(platform, &message, PLATFORM_SOURCE) {
            if let Err(undo_err) = self.backward(ctx) {
                warn!(app = %ctx.app.name(), error = %undo_err, "could not undo provisioning");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Remove the backend and destroy the units. Runs from `forward` when
    /// the final save fails, and from the pipeline if a later step fails.
    fn backward(&self, ctx: &mut CreateContext<'a>) -> AppResult<()> {
        match ctx.platform.router.remove_backend(ctx.app.name()) {
            Ok(()) | Err(RouterError::BackendNotFound) => {}
            Err(err) => return Err(err.into()),
        }
        ctx.platform
            .provisioner
            .destroy(ctx.app.record())
            .map_err(AppError::collaborator("destroying provisioned app"))
    }
}

/// Create `app`: persist it, then provision storage, repository and
/// backend. Any failure undoes the steps that already ran.
pub fn create_app(platform: &Platform, app: App) -> AppResult<App> {
    if !App::is_valid_name(app.name()) {
        return Err(AppError::Validation(INVALID_NAME.to_string()));
    }

    let pipeline = Pipeline::new()
        .then(InsertApp)
        .then(CreateBucket)
        .then(CreateRepository)
        .then(ProvisionBackend);

    let mut ctx = CreateContext { platform, app };
    pipeline.execute(&mut ctx)?;
    info!(app = %ctx.app.name(), platform = %ctx.app.record().platform, "app created");
    Ok(ctx.app)
}

/// Tear `app` down: bucket, unit and service bindings, routing backend,
/// then the record itself.
///
/// Unbinding is attempted for every bound instance; failures are reported
/// together and leave the record in place.
pub fn destroy_app(platform: &Platform, app: &App) -> AppResult<()> {
    let name = app.name();
    platform
        .storage
        .destroy_bucket(name)
        .map_err(AppError::collaborator("destroying bucket"))?;

    if let Ok(unit) = app.unit() {
        match platform.provisioner.destroy_unit(app.record(), unit) {
            Ok(output) => debug!(app = %name, unit = %unit.name, %output, "unit destroyed"),
            Err(err) => {
                warn!(app = %name, unit = %unit.name, error = %err, "unit destroy failed");
                return Err(AppError::UnitDestroy(format!("{err:#}")));
            }
        }
        unbind_all(platform, app)?;
    }

    match platform.router.remove_backend(name) {
        Ok(()) | Err(RouterError::BackendNotFound) => {}
        Err(err) => return Err(err.into()),
    }

    platform.store.delete_app(name)?;
    info!(app = %name, "app destroyed");
    Ok(())
}

fn unbind_all(platform: &Platform, app: &App) -> AppResult<()> {
    let mut failures = UnbindFailures::default();
    for mut instance in platform.store.list_service_instances_for_app(app.name())? {
        match platform.unbinder.unbind(&instance, app.record()) {
            Ok(()) => {
                instance.apps.retain(|a| a != app.name());
                platform.store.put_service_instance(&instance)?;
                debug!(app = %app.name(), instance = %instance.name, "instance unbound");
            }
            Err(err) => {
                warn!(app = %app.name(), instance = %instance.name, error = %err, "unbind failed");
                failures.push(&instance.name, err);
            }
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(AppError::Unbind(failures))
    }
}
