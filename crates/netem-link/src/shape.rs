//! `tc netem`/`tbf` link shaping.

use anyhow::{Result, bail};

use crate::ns::Namespace;

/// Shaping parameters applied to one interface.
///
/// All fields default to `None`/`false`. Set only the parameters you need;
/// omitted parameters are not passed to `tc`. An all-`None` shape clears
/// any existing impairment on the interface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkShape {
    pub rate_kbit: Option<u64>,
    pub delay_ms: Option<u32>,
    pub jitter_ms: Option<u32>,
    pub loss_percent: Option<f32>,
    /// When true, bandwidth is enforced via a TBF root qdisc that drops
    /// excess packets. When false, `rate_kbit` only adds serialization
    /// delay (netem `rate` param) without real enforcement.
    pub tbf_shaping: bool,
}

impl LinkShape {
    /// True if no shaping parameters are set (applying would be a no-op).
    fn is_empty(&self) -> bool {
        self.rate_kbit.is_none() && self.delay_ms.is_none() && self.loss_percent.is_none()
    }

    /// True if any netem-specific parameter (delay/loss) is set.
    fn has_netem_params(&self) -> bool {
        self.delay_ms.is_some() || self.loss_percent.is_some()
    }

    /// Build the netem parameter list (delay, loss). When `include_rate` is
    /// true, appends the netem `rate` param too.
    pub(crate) fn netem_args(&self, include_rate: bool) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(delay) = self.delay_ms {
            args.push("delay".into());
            args.push(format!("{delay}ms"));
            if let Some(jitter) = self.jitter_ms
                && jitter > 0
            {
                args.push(format!("{jitter}ms"));
            }
        }

        if let Some(loss) = self.loss_percent {
            args.push("loss".into());
            args.push(format!("{loss}%"));
        }

        if include_rate
            && let Some(rate) = self.rate_kbit
        {
            args.extend(["rate".into(), format!("{rate}kbit")]);
        }

        args
    }
}

/// Apply `shape` to `interface` inside `ns`.
///
/// Always removes the existing root qdisc first (clean slate). With
/// `tbf_shaping`, installs TBF as root for real bandwidth enforcement
/// and chains netem as a child. Without it, netem is the root qdisc.
pub fn apply_shape(ns: &Namespace, interface: &str, shape: &LinkShape) -> Result<()> {
    // Always start clean
    let _ = ns.exec("tc", &["qdisc", "del", "dev", interface, "root"]);

    if shape.is_empty() {
        return Ok(());
    }

    if shape.tbf_shaping {
        apply_tbf_with_netem(ns, interface, shape)
    } else {
        apply_netem_root(ns, interface, shape)
    }
}

/// Remove all shaping from `interface` inside `ns`.
pub fn clear_shape(ns: &Namespace, interface: &str) -> Result<()> {
    let _ = ns.exec("tc", &["qdisc", "del", "dev", interface, "root"]);
    Ok(())
}

/// TBF burst size in bytes: a tenth of a second of traffic, at least one MTU.
pub(crate) fn tbf_burst(rate_kbit: u64) -> u64 {
    let rate_bytes_per_sec = rate_kbit * 1000 / 8;
    rate_bytes_per_sec.max(15400) / 10
}

/// TBF as root (bandwidth enforcement) + netem as child (delay/loss).
fn apply_tbf_with_netem(ns: &Namespace, iface: &str, shape: &LinkShape) -> Result<()> {
    let rate = shape
        .rate_kbit
        .ok_or_else(|| anyhow::anyhow!("tbf_shaping requires rate_kbit"))?;

    let rate_arg = format!("{rate}kbit");
    let burst_arg = tbf_burst(rate).to_string();

    tc_checked(
        ns,
        &[
            "qdisc", "add", "dev", iface, "root", "handle", "1:", "tbf", "rate", &rate_arg,
            "burst", &burst_arg, "latency", "1s",
        ],
        "apply TBF qdisc",
    )?;

    if shape.has_netem_params() {
        let netem_params = shape.netem_args(false);
        let mut args = vec![
            "qdisc", "add", "dev", iface, "parent", "1:1", "handle", "10:", "netem",
        ];
        let netem_strs: Vec<&str> = netem_params.iter().map(|s| s.as_str()).collect();
        args.extend_from_slice(&netem_strs);
        tc_checked(ns, &args, "apply netem child qdisc")?;
    }

    Ok(())
}

/// Netem as root qdisc (no real bandwidth enforcement).
fn apply_netem_root(ns: &Namespace, iface: &str, shape: &LinkShape) -> Result<()> {
    let netem_params = shape.netem_args(true);
    let mut args = vec!["qdisc", "add", "dev", iface, "root", "netem"];
    let netem_strs: Vec<&str> = netem_params.iter().map(|s| s.as_str()).collect();
    args.extend_from_slice(&netem_strs);
    tc_checked(ns, &args, "apply netem qdisc")?;
    Ok(())
}

/// Run `tc` inside `ns`, bailing with stderr + the full command on failure.
fn tc_checked(ns: &Namespace, args: &[&str], ctx: &str) -> Result<()> {
    let output = ns.exec("tc", args)?;
    if !output.status.success() {
        bail!(
            "{ctx}: tc {}\n{}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
