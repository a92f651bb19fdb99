//! Benchmarks for the offline stages and for dry-run planning.
//!
//! Documents are generated in memory; planning runs against a remote state
//! where half of the repos already exist so both the create and the diff
//! paths are exercised.

use artsync::codec;
use artsync::defaults;
use artsync::directory::GroupImport;
use artsync::error::Result;
use artsync::model::{Action, DeclaredRepo, Identities, RemotePermission, RemoteRepo};
use artsync::phases::provision::{ProvisionOptions, Provisioner};
use artsync::phases::{dedup, load, validate};
use artsync::platform::{
    PermissionRequest, PlatformWriter, RemoteState, RepoRequest, SessionTokens, UserRequest,
};
use artsync::report::RunReport;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Accepts every write. Dry runs never call it.
struct NullWriter;

impl PlatformWriter for NullWriter {
    fn create_repository(&self, _repo: &RepoRequest) -> Result<()> {
        Ok(())
    }

    fn update_repository(&self, _repo: &RepoRequest) -> Result<()> {
        Ok(())
    }

    fn create_permission(&self, _permission: &PermissionRequest) -> Result<()> {
        Ok(())
    }

    fn update_permission(&self, _permission: &PermissionRequest) -> Result<()> {
        Ok(())
    }

    fn create_user(&self, _user: &UserRequest) -> Result<()> {
        Ok(())
    }

    fn ui_login(&self, _username: &str, _password: &str) -> Result<SessionTokens> {
        Ok(SessionTokens {
            access: String::new(),
            refresh: String::new(),
        })
    }

    fn import_group(&self, _session: &SessionTokens, _import: &GroupImport) -> Result<()> {
        Ok(())
    }
}

/// A YAML document declaring `count` repos, every fourth one as a `names`
/// group of two.
fn document(count: usize) -> String {
    let mut text = String::new();
    for i in 0..count {
        if i % 4 == 0 {
            text.push_str(&format!("- names: [group-{i}-a, group-{i}-b]\n"));
        } else {
            text.push_str(&format!("- name: repo-{i}\n"));
        }
        text.push_str(&format!("  description: repo number {i}\n"));
        text.push_str("  read: [readers]\n");
        text.push_str(&format!("  write: [user-{}]\n", i % 10));
        text.push_str("  manage: [admins]\n");
    }
    text
}

fn loaded(count: usize) -> Vec<DeclaredRepo> {
    let mut report = RunReport::new();
    let text = document(count);
    let records = load::load_document("bench.yaml", &text, false, &mut report);
    load::expand(records, &mut report)
}

fn remote_state(records: &[DeclaredRepo]) -> RemoteState {
    let mut state = RemoteState::default();
    for record in records.iter().step_by(2) {
        state.repos.push(RemoteRepo {
            key: record.name.clone(),
            description: String::new(),
            access_class: defaults::ACCESS_CLASS.to_string(),
            package_type: defaults::PACKAGE_TYPE.to_string(),
            layout_ref: defaults::LAYOUT.to_string(),
        });
        state.permissions.push(RemotePermission {
            name: record.name.clone(),
            users: [("user-0".to_string(), [Action::new("READ")].into_iter().collect())]
                .into_iter()
                .collect(),
            groups: Default::default(),
            targets: [(record.name.clone(), defaults::scope())].into_iter().collect(),
        });
    }
    state.users = (0..10).map(|i| format!("user-{i}")).collect();
    state.groups = vec!["readers".to_string(), "admins".to_string()];
    state
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for count in [10, 500] {
        let text = document(count);
        group.bench_function(format!("yaml_{count}"), |b| {
            b.iter(|| codec::decode(black_box(&text), "bench.yaml"))
        });
    }

    group.finish();
}

fn bench_offline_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("offline_stages");
    let records = loaded(500);

    group.bench_function("dedup_500", |b| {
        b.iter_batched(
            || records.clone(),
            |records| dedup::execute(records, &mut RunReport::new()),
            criterion::BatchSize::SmallInput,
        )
    });

    group.bench_function("validate_500", |b| {
        b.iter_batched(
            || records.clone(),
            |records| validate::execute(records, &[], &mut RunReport::new()),
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_dry_run_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("planning");
    let records = loaded(500);
    let state = remote_state(&records);
    let identities = Identities::new(state.users.clone(), state.groups.clone());
    let writer = NullWriter;
    let provisioner = Provisioner::new(
        &writer,
        ProvisionOptions {
            dry_run: true,
            ..ProvisionOptions::default()
        },
    );

    group.bench_function("dry_run_500", |b| {
        b.iter(|| {
            let mut report = RunReport::new();
            provisioner.execute(black_box(&records), &state, &identities, &mut report);
            report
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_decode,
    bench_offline_stages,
    bench_dry_run_planning
);
criterion_main!(benches);
