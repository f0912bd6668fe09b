//! A deterministic in-process stand-in for a database driver.
//!
//! Every call the registry makes is recorded in a shared [`FakeLog`] so tests
//! can assert what reached the driver (and what never did). Results are
//! scripted through the log: `row_count`, `next_insert_id`, `rows`.
//! Any query text containing `FAIL` is rejected at prepare time, `BAD_EXEC`
//! at execute time.

use connkeeper::{ConnectParams, Driver, DriverError, Handle, Params, Row, Statement, Value};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Default)]
pub struct FakeLog {
    pub connects: RefCell<Vec<ConnectParams>>,
    pub prepared: RefCell<Vec<String>>,
    pub executed: RefCell<Vec<(String, Params)>>,
    pub transactions: RefCell<Vec<&'static str>>,
    /// Cursors executed but not yet closed
    pub open_cursors: Cell<i64>,
    pub row_count: Cell<u64>,
    pub next_insert_id: Cell<i64>,
    pub rows: RefCell<Vec<Vec<(String, Value)>>>,
    pub refuse_connect: Cell<bool>,
}

impl FakeLog {
    pub fn connect_count(&self) -> usize {
        self.connects.borrow().len()
    }

    pub fn touched(&self) -> bool {
        !self.connects.borrow().is_empty()
            || !self.prepared.borrow().is_empty()
            || !self.executed.borrow().is_empty()
    }
}

#[derive(Clone, Default)]
pub struct FakeDriver {
    pub log: Rc<FakeLog>,
}

impl FakeDriver {
    pub fn new() -> (Self, Rc<FakeLog>) {
        let driver = FakeDriver::default();
        let log = Rc::clone(&driver.log);
        (driver, log)
    }
}

impl Driver for FakeDriver {
    type Handle = FakeHandle;

    fn name(&self) -> &str {
        "fake"
    }

    fn connect(&self, params: &ConnectParams) -> Result<FakeHandle, DriverError> {
        self.log.connects.borrow_mut().push(params.clone());
        if self.log.refuse_connect.get() {
            return Err(DriverError::with_code("connection refused", "2002"));
        }
        Ok(FakeHandle {
            log: Rc::clone(&self.log),
            in_tx: Cell::new(false),
        })
    }
}

pub struct FakeHandle {
    log: Rc<FakeLog>,
    in_tx: Cell<bool>,
}

impl Handle for FakeHandle {
    type Statement<'h> = FakeStatement;

    fn prepare(&self, text: &str) -> Result<FakeStatement, DriverError> {
        self.log.prepared.borrow_mut().push(text.to_string());
        if text.contains("FAIL") {
            return Err(DriverError::new(format!("syntax error near \"{}\"", text)));
        }
        Ok(FakeStatement {
            text: text.to_string(),
            log: Rc::clone(&self.log),
            open: false,
            rows: VecDeque::new(),
            columns: Vec::new(),
        })
    }

    fn last_insert_id(&self) -> i64 {
        self.log.next_insert_id.get()
    }

    fn begin_transaction(&self) -> Result<(), DriverError> {
        self.log.transactions.borrow_mut().push("begin");
        if self.in_tx.replace(true) {
            return Err(DriverError::new("There is already an active transaction"));
        }
        Ok(())
    }

    fn commit(&self) -> Result<(), DriverError> {
        self.log.transactions.borrow_mut().push("commit");
        if !self.in_tx.replace(false) {
            return Err(DriverError::new("There is no active transaction"));
        }
        Ok(())
    }

    fn roll_back(&self) -> Result<(), DriverError> {
        self.log.transactions.borrow_mut().push("rollback");
        if !self.in_tx.replace(false) {
            return Err(DriverError::new("There is no active transaction"));
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx.get()
    }
}

pub struct FakeStatement {
    text: String,
    log: Rc<FakeLog>,
    open: bool,
    rows: VecDeque<Row>,
    columns: Vec<String>,
}

impl Statement for FakeStatement {
    fn execute(&mut self, params: &Params) -> Result<(), DriverError> {
        self.log
            .executed
            .borrow_mut()
            .push((self.text.clone(), params.clone()));
        if self.text.contains("BAD_EXEC") {
            return Err(DriverError::with_code("constraint violation", "23000"));
        }

        let scripted = self.log.rows.borrow();
        self.columns = scripted
            .first()
            .map(|row| row.iter().map(|(c, _)| c.clone()).collect())
            .unwrap_or_default();
        let columns: std::sync::Arc<[String]> = self.columns.clone().into();
        self.rows = scripted
            .iter()
            .map(|row| Row::new(columns.clone(), row.iter().map(|(_, v)| v.clone()).collect()))
            .collect();

        if !self.open {
            self.open = true;
            self.log.open_cursors.set(self.log.open_cursors.get() + 1);
        }
        Ok(())
    }

    fn fetch(&mut self) -> Result<Option<Row>, DriverError> {
        Ok(if self.open { self.rows.pop_front() } else { None })
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn row_count(&self) -> u64 {
        self.log.row_count.get()
    }

    fn close_cursor(&mut self) {
        if self.open {
            self.open = false;
            self.rows.clear();
            self.log.open_cursors.set(self.log.open_cursors.get() - 1);
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
