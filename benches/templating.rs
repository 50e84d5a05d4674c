use std::io::{Cursor, Write};

use criterion::{criterion_group, criterion_main, Criterion};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use lurefill::{Attachment, TemplateContext};

fn sample_docx(paragraphs: usize) -> Vec<u8> {
    let mut body = String::from("<w:document><w:body>");
    for i in 0..paragraphs {
        body.push_str(&format!("<w:p><w:t>Paragraph {i} for {{{{.FirstName}}}}</w:t></w:p>"));
    }
    body.push_str("</w:body></w:document>");

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(b"<Types/>").unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(body.as_bytes()).unwrap();
    writer.start_file("word/media/image1.png", options).unwrap();
    writer.write_all(&vec![0x42u8; 64 * 1024]).unwrap();
    writer.finish().unwrap().into_inner()
}

fn bench_docx(c: &mut Criterion) {
    let att = Attachment::from_bytes("letter.docx", "", &sample_docx(500));
    let ctx = TemplateContext::sample();

    c.bench_function("apply_template_docx", |b| {
        b.iter(|| att.apply_template_default(&ctx).unwrap())
    });
}

fn bench_vanilla_fast_path(c: &mut Criterion) {
    let att = Attachment::from_bytes("plain.txt", "text/plain", &vec![b'a'; 256 * 1024]);
    let ctx = TemplateContext::sample();
    att.apply_template_default(&ctx).unwrap();

    c.bench_function("apply_template_vanilla", |b| {
        b.iter(|| att.apply_template_default(&ctx).unwrap())
    });
}

criterion_group!(benches, bench_docx, bench_vanilla_fast_path);
criterion_main!(benches);
