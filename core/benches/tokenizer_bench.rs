use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jobrank_core::compose::compose_candidate;
use jobrank_core::model::{CandidateRecord, Education, Experience};
use jobrank_core::tokenizer::{tokenize, StopWords, Tokenizer};

const POSTING: &str = "<p>We are hiring a <strong>Senior Backend Developer</strong> to build and \
    operate the APIs behind our job board. You will own services written in Go and PHP, run them \
    on Kubernetes, and work with the product team on search relevance.</p><ul><li>5+ years of \
    backend experience</li><li>MySQL, Redis, REST</li><li>On-call rotation</li></ul>";

fn profile() -> CandidateRecord {
    CandidateRecord {
        id: 1,
        title: Some("Platform Engineer".into()),
        bio: Some("Builds reliable infrastructure and developer tooling.".into()),
        skills: vec!["Go".into(), "Kubernetes".into(), "Terraform".into(), "PostgreSQL".into()],
        experiences: vec![Experience {
            id: 1,
            designation: Some("Site Reliability Engineer".into()),
            responsibilities: Some(POSTING.into()),
        }],
        educations: vec![Education { id: 1, degree: Some("BSc Computer Science".into()) }],
        profession: Some("Engineer".into()),
        address: None,
        phone: None,
        email: None,
        profile_complete: true,
        visibility: true,
    }
}

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_job_posting", |b| b.iter(|| tokenize(black_box(POSTING))));

    let candidate = profile();
    let extended = Tokenizer::new(StopWords::Extended);
    c.bench_function("compose_and_tokenize_candidate", |b| {
        b.iter(|| extended.tokenize(&compose_candidate(black_box(&candidate))))
    });
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
