use criterion::{criterion_group, criterion_main, Criterion};
use std::fmt::Write as _;
use std::path::PathBuf;

use mbx2mbox::convert::{convert, ConvertOptions};

fn synthetic_archive(messages: usize) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let mut contents = String::new();
    for i in 0..messages {
        write!(
            contents,
            "From ???@??? Thu Jan 03 11:42:42 2002\n\
             From: sender{i}@example.com\n\
             To: list@example.com\n\
             Subject: benchmark message {i}\n\
             Message-ID: <msg{i}@example.com>\n\n"
        )
        .unwrap();
        for line in 0..40 {
            writeln!(
                contents,
                "Body line {line} of message {i}, padding the archive out to a useful size."
            )
            .unwrap();
        }
    }
    let path = dir.path().join("Bench.mbx");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

fn bench_convert_archive(c: &mut Criterion) {
    let (dir, archive) = synthetic_archive(200);

    c.bench_function("convert_200_messages", |b| {
        b.iter(|| {
            let options = ConvertOptions {
                output: Some(dir.path().join("Bench.mbx.new")),
                ..Default::default()
            };
            convert(&archive, &options, None).unwrap().messages
        })
    });
}

criterion_group!(benches, bench_convert_archive);
criterion_main!(benches);
