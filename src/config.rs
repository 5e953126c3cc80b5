use crate::dataflow::HardwareParams;
use color_eyre::{
    eyre::{self, WrapErr},
    Section, SectionExt,
};
use std::path::Path;
use std::str::FromStr;

pub const GENERAL: &str = "general";
pub const ARCHITECTURE: &str = "architecture_presets";
pub const LLC: &str = "llc";

/// A simulator configuration file.
///
/// Section and key lookups ignore ASCII case, like the simulator does.
#[derive(Debug, Clone, Default)]
pub struct ScaleConfig {
    ini: ini::Ini,
}

impl FromStr for ScaleConfig {
    type Err = eyre::Report;

    fn from_str(config: &str) -> Result<Self, Self::Err> {
        let ini = ini::Ini::load_from_str(config)?;
        Ok(Self { ini })
    }
}

impl ScaleConfig {
    pub fn from_path(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let ini = ini::Ini::load_from_file(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        Ok(Self { ini })
    }

    fn section_name(&self, section: &str) -> Option<String> {
        self.ini
            .sections()
            .flatten()
            .find(|name| name.eq_ignore_ascii_case(section))
            .map(str::to_string)
    }

    fn key_name(&self, section: &str, key: &str) -> Option<String> {
        self.ini
            .section(Some(section))?
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(name, _)| name.to_string())
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.ini
            .iter()
            .filter(|(name, _)| name.is_some_and(|name| name.eq_ignore_ascii_case(section)))
            .flat_map(|(_, properties)| properties.iter())
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.trim())
    }

    /// Parse the value of `section.key`.
    pub fn get_parsed<T>(&self, section: &str, key: &str) -> eyre::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let value = self
            .get(section, key)
            .ok_or_else(|| eyre::eyre!("missing config key {section}.{key}"))?;
        value
            .parse()
            .wrap_err_with(|| format!("invalid value for config key {section}.{key}"))
            .with_section(|| value.to_string().header("value:"))
    }

    /// Set `section.key`, keeping the spelling of an existing section or key.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let section = self
            .section_name(section)
            .unwrap_or_else(|| section.to_string());
        let key = self
            .key_name(&section, key)
            .unwrap_or_else(|| key.to_string());
        self.ini.with_section(Some(section)).set(key, value);
    }

    /// Multiply the integer value of `section.key` by `factor`.
    pub fn scale(&mut self, section: &str, key: &str, factor: u64) -> eyre::Result<()> {
        let value: u64 = self.get_parsed(section, key)?;
        let scaled = value
            .checked_mul(factor)
            .ok_or_else(|| eyre::eyre!("{section}.{key} = {value} overflows when scaled by {factor}"))?;
        self.set(section, key, scaled.to_string());
        Ok(())
    }

    /// Parse `section.key` as a count of at least one.
    fn get_positive(&self, section: &str, key: &str) -> eyre::Result<u64> {
        let value: u64 = self.get_parsed(section, key)?;
        if value == 0 {
            eyre::bail!("config key {section}.{key} must be at least 1");
        }
        Ok(value)
    }

    /// Hardware parameters the dataflow selector needs.
    ///
    /// Array dimensions and the word size must be positive.
    pub fn hardware_params(&self) -> eyre::Result<HardwareParams> {
        let size_kb: u64 = self.get_parsed(LLC, "SizekB")?;
        let assoc: u32 = self.get_parsed(LLC, "Assoc")?;
        let cache_assoc = 2u64
            .checked_pow(assoc)
            .ok_or_else(|| eyre::eyre!("llc.Assoc = {assoc} is too large"))?;
        Ok(HardwareParams {
            array_height: self.get_positive(ARCHITECTURE, "ArrayHeight")?,
            array_width: self.get_positive(ARCHITECTURE, "ArrayWidth")?,
            cache_capacity_bytes: size_kb
                .checked_mul(1024)
                .ok_or_else(|| eyre::eyre!("llc.SizekB = {size_kb} is too large"))?,
            cache_assoc,
            word_size_bytes: self.get_positive(ARCHITECTURE, "WordSize")?,
            batch_size: self.get_parsed(ARCHITECTURE, "BatchSize")?,
        })
    }

    pub fn write_to(&self, writer: &mut impl std::io::Write) -> eyre::Result<()> {
        self.ini.write_to(writer)?;
        Ok(())
    }

    pub fn write_to_path(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let path = path.as_ref();
        let mut writer = utils::fs::open_writable(path)?;
        self.write_to(&mut writer)
            .wrap_err_with(|| format!("failed to write config {}", path.display()))
    }
}
