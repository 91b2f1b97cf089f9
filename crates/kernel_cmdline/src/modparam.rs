//! Scanning the kernel command line for module parameters.
//!
//! Parameters addressed to a module have the shape `module.param=value`
//! or the bare switch `module.param`.  Values may be wrapped in double
//! quotes to carry whitespace.  Everything else on the line (global
//! kernel parameters, ill-formed tokens) is skipped.
//!
//! The scan walks bytes rather than pre-split tokens because whether a
//! space ends a token depends on the quoting state, and because of the
//! repair applied to boot loaders which emit
//! `"parport.dyndbg=file drivers/parport/ieee1284_ops.c +mpf"` when the
//! user wrote `parport.dyndbg="file drivers/parport/ieee1284_ops.c +mpf"`.

/// Scanner state while walking one token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// The current token is ill-formed; skip to the next whitespace.
    Ignore,
    /// Looking for the `.` ending the module name.
    Modname,
    /// Looking for the `=` ending the parameter name.
    Param,
    /// Inside the value.
    Value,
    /// A full token was recognized.
    Complete,
}

/// A single `module.param[=value]` entry from the kernel command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleParam {
    module: Vec<u8>,
    /// `param` or `param=value`, with the value's quotes preserved.
    param: Vec<u8>,
    /// Offset of the value inside `param`, when there is one.
    value: Option<usize>,
}

impl ModuleParam {
    /// The module name, exactly as written.
    pub fn module(&self) -> &[u8] {
        &self.module
    }

    /// The parameter together with its value, e.g. `dyndbg="+p"`.
    ///
    /// This is the text the module loader passes on when it inserts the
    /// module.
    pub fn param(&self) -> &[u8] {
        &self.param
    }

    /// The parameter name without the value.
    pub fn key(&self) -> &[u8] {
        match self.value {
            Some(v) => &self.param[..v - 1],
            None => &self.param,
        }
    }

    /// The value as written, including any quotes.
    pub fn value(&self) -> Option<&[u8]> {
        self.value.map(|v| &self.param[v..])
    }

    /// The value with its enclosing double quotes removed.
    ///
    /// *Only* the first and last double quotes are stripped.
    pub fn unquoted_value(&self) -> Option<&[u8]> {
        self.value().map(|value| {
            let value = value.strip_prefix(b"\"").unwrap_or(value);
            value.strip_suffix(b"\"").unwrap_or(value)
        })
    }
}

/// An iterator over the module parameters of a kernel command line.
///
/// This is created by [`crate::bytes::Cmdline::module_params`].  It owns
/// a private copy of the line since the quote repair rewrites bytes in
/// place.
#[derive(Debug)]
pub struct ModuleParams {
    /// The command line followed by a terminating NUL.
    buf: Vec<u8>,
    pos: usize,
    done: bool,
    state: State,
    is_quoted: bool,
    modname: usize,
    param: Option<usize>,
    value: Option<usize>,
    quote_start: Option<usize>,
}

impl ModuleParams {
    pub(crate) fn new(line: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line);
        buf.push(b'\0');
        Self {
            buf,
            pos: 0,
            done: false,
            state: State::Modname,
            is_quoted: false,
            modname: 0,
            param: None,
            value: None,
            quote_start: None,
        }
    }

    /// Start looking for a new token at `at`.
    fn restart(&mut self, at: usize) {
        self.modname = at;
        self.state = State::Modname;
        self.param = None;
        self.value = None;
        self.quote_start = None;
    }

    /// Extract the token ending at `end`, whose byte has already been
    /// overwritten with a terminator.
    fn complete(&mut self, end: usize) -> Option<ModuleParam> {
        let mut modname = self.modname;
        let mut param = self.param?;
        let mut value = self.value;

        // The opening quote came before the module name rather than
        // before the value:
        //
        //   quote_start
        //   |
        //   |modname  param  value
        //   ||        |      |
        //   vv        v      v
        //   "parport\0dyndbg=file drivers/parport/ieee1284_ops.c +mpf"
        //
        // Shift the module name and parameter one byte to the left over
        // the quote, and put the quote back right in front of the value.
        if let (Some(quote_start), Some(v)) = (self.quote_start, value) {
            if quote_start < modname {
                self.buf.copy_within(modname..v, quote_start);
                modname -= 1;
                param -= 1;
                let v = v - 1;
                self.buf[v] = b'"';
                value = Some(v);
            }
        }

        Some(ModuleParam {
            // param - 1 is the terminator that replaced the '.'
            module: self.buf[modname..param - 1].to_vec(),
            param: self.buf[param..end].to_vec(),
            value: value.map(|v| v - param),
        })
    }
}

impl Iterator for ModuleParams {
    type Item = ModuleParam;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let p = self.pos;
            self.pos += 1;
            let c = self.buf.get(p).copied().unwrap_or(b'\0');

            match c {
                b'"' => {
                    self.is_quoted = !self.is_quoted;

                    // Only an opening quote as the very first byte of a
                    // module name is allowed outside of a value.
                    if self.is_quoted && self.state == State::Modname && p == self.modname {
                        self.quote_start = Some(p);
                        self.modname = p + 1;
                    } else if self.state != State::Value {
                        self.state = State::Ignore;
                    }
                }
                b'\0' | b' ' | b'\n' | b'\t' | b'\x0b' | b'\x0c' | b'\r' => {
                    if c == b'\0' {
                        self.done = true;
                    }
                    if self.is_quoted && self.state == State::Value {
                        // whitespace inside a quoted value
                    } else if self.is_quoted {
                        // spaces are only allowed in the value part
                        self.state = State::Ignore;
                    } else if matches!(self.state, State::Value | State::Param) {
                        self.buf[p] = b'\0';
                        self.state = State::Complete;
                    } else {
                        self.restart(p + 1);
                    }
                }
                b'.' => match self.state {
                    State::Modname => {
                        self.buf[p] = b'\0';
                        self.param = Some(p + 1);
                        self.state = State::Param;
                    }
                    State::Param => self.state = State::Ignore,
                    _ => {}
                },
                b'=' => match self.state {
                    State::Param => {
                        self.value = Some(p + 1);
                        self.state = State::Value;
                    }
                    State::Modname => self.state = State::Ignore,
                    _ => {}
                },
                _ => {}
            }

            if self.state == State::Complete {
                let found = self.complete(p);
                self.restart(p + 1);
                if found.is_some() {
                    return found;
                }
            }
        }
        None
    }
}
