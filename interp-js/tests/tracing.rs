mod common;

use common::assign;
use common::call;
use common::decl;
use common::expr;
use common::function;
use common::ident;
use common::num;
use common::run;
use common::runtime;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedWriter {
  buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
  fn contents(&self) -> String {
    String::from_utf8(self.buffer.lock().unwrap().clone()).unwrap()
  }
}

struct SharedWriterGuard<'a> {
  buffer: &'a Arc<Mutex<Vec<u8>>>,
}

impl<'a> io::Write for SharedWriterGuard<'a> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.buffer.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> MakeWriter<'a> for SharedWriter {
  type Writer = SharedWriterGuard<'a>;

  fn make_writer(&'a self) -> Self::Writer {
    SharedWriterGuard {
      buffer: &self.buffer,
    }
  }
}

#[test]
fn invocations_run_inside_an_invoke_span() {
  let writer = SharedWriter::default();
  let subscriber = tracing_subscriber::fmt()
    .with_span_events(FmtSpan::CLOSE)
    .with_max_level(tracing::Level::TRACE)
    .with_ansi(false)
    .with_writer(writer.clone())
    .finish();
  let guard = tracing::subscriber::set_default(subscriber);

  let mut rt = runtime().unwrap();
  let leak = function(Some("leak"), Vec::new(), vec![expr(assign("leaked", num(1.0)))]);
  run(&mut rt, vec![decl(leak), expr(call(ident("leak"), Vec::new()))]).unwrap();

  drop(guard);
  let output = writer.contents();
  assert!(
    output.contains("invoke{function=\"leak\" argc=0}") || output.contains("invoke{function=leak argc=0}"),
    "expected invoke span output, got: {output}"
  );
  assert!(
    output.contains("invocation scope ready"),
    "expected invocation event, got: {output}"
  );
  assert!(
    output.contains("implicit global created by sloppy assignment"),
    "expected implicit global event, got: {output}"
  );
  assert!(output.contains("branch enter") && output.contains("branch exit"));
}
