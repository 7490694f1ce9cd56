//! 参数集存储.
//!
//! 按 id 保存 VPS/SPS/PPS, 以内容校验和去重:
//! - 新 id: 追加, 标记配置已变化
//! - 已有 id 且内容变化: 原位替换, 标记配置已变化
//! - 已有 id 且内容相同: 不变 (重复发送参数集是合法的)

use bytes::Bytes;
use esparse_core::crc::crc32;
use esparse_core::{EsError, EsResult};
use log::debug;

use crate::codec::{Codec, ParameterSet, SequenceParameters};

/// 参数集种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// 视频参数集
    Vps,
    /// 序列参数集
    Sps,
    /// 图像参数集
    Pps,
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vps => write!(f, "VPS"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
        }
    }
}

/// 注册结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// 新 id
    Added,
    /// 同 id 内容变化, 已替换
    Replaced,
    /// 同 id 内容相同
    Unchanged,
}

/// 已保存的参数集
#[derive(Debug, Clone)]
pub struct StoredParameterSet<T> {
    /// 参数集 id
    pub id: u32,
    /// NALU 内容校验和
    pub checksum: u32,
    /// 解码后的字段
    pub params: T,
    /// 原始 (或重写后的) NALU, 用于重新输出
    pub nalu: Bytes,
}

/// 单一种类的参数集表, 按首次出现顺序保存
#[derive(Debug, Clone)]
pub struct ParamRegistry<T> {
    entries: Vec<StoredParameterSet<T>>,
}

impl<T> Default for ParamRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: ParameterSet> ParamRegistry<T> {
    fn insert(&mut self, params: T, nalu: Bytes) -> RegisterOutcome {
        let id = params.id();
        let checksum = crc32(&nalu);
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) if entry.checksum == checksum => RegisterOutcome::Unchanged,
            Some(entry) => {
                entry.checksum = checksum;
                entry.params = params;
                entry.nalu = nalu;
                RegisterOutcome::Replaced
            }
            None => {
                self.entries.push(StoredParameterSet {
                    id,
                    checksum,
                    params,
                    nalu,
                });
                RegisterOutcome::Added
            }
        }
    }

    /// 按 id 查找
    pub fn get(&self, id: u32) -> Option<&StoredParameterSet<T>> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// 第一个注册的参数集
    pub fn first(&self) -> Option<&StoredParameterSet<T>> {
        self.entries.first()
    }

    /// 按注册顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &StoredParameterSet<T>> {
        self.entries.iter()
    }

    /// 参数集个数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 一次注册的结果
#[derive(Debug, Clone)]
pub struct Registration {
    /// 参数集种类
    pub kind: ParamKind,
    /// 参数集 id
    pub id: u32,
    /// 注册结果
    pub outcome: RegisterOutcome,
    /// 实际保存的 NALU (可能已重写)
    pub nalu: Bytes,
}

/// 参数集存储
#[derive(Debug)]
pub struct ParameterSetStore<C: Codec> {
    vps: ParamRegistry<C::Vps>,
    sps: ParamRegistry<C::Sps>,
    pps: ParamRegistry<C::Pps>,
    sei: Vec<Bytes>,
    config_changed: bool,
    keep_ar_info: bool,
}

impl<C: Codec> ParameterSetStore<C> {
    /// 创建空存储; `keep_ar_info` 为 false 时保存去除宽高比信息的 SPS
    pub fn new(keep_ar_info: bool) -> Self {
        Self {
            vps: ParamRegistry::default(),
            sps: ParamRegistry::default(),
            pps: ParamRegistry::default(),
            sei: Vec::new(),
            config_changed: false,
            keep_ar_info,
        }
    }

    /// 解析并注册一个参数集 NALU
    ///
    /// 解析失败返回错误, 调用方丢弃该 NALU. HEVC SPS 引用的 VPS 必须已存在.
    pub fn register(&mut self, kind: ParamKind, nalu: Bytes) -> EsResult<Registration> {
        let (id, outcome, stored) = match kind {
            ParamKind::Vps => {
                let vps = C::parse_vps(&nalu)?;
                let id = vps.id();
                (id, self.vps.insert(vps, nalu.clone()), nalu)
            }
            ParamKind::Sps => {
                let parsed = C::parse_sps(&nalu, self.keep_ar_info)?;
                if C::USES_VPS {
                    let vps_id = parsed.sps.vps_id().unwrap_or(0);
                    if self.vps.get(vps_id).is_none() {
                        return Err(EsError::InvalidData(format!(
                            "{}: SPS {} 引用的 VPS {} 不存在",
                            C::NAME,
                            parsed.sps.id(),
                            vps_id
                        )));
                    }
                }
                let stored = parsed.rewritten.map_or(nalu, Bytes::from);
                let id = parsed.sps.id();
                (id, self.sps.insert(parsed.sps, stored.clone()), stored)
            }
            ParamKind::Pps => {
                let pps = C::parse_pps(&nalu)?;
                let id = pps.id();
                (id, self.pps.insert(pps, nalu.clone()), nalu)
            }
        };

        if outcome != RegisterOutcome::Unchanged {
            debug!("{}: {} {} {:?}", C::NAME, kind, id, outcome);
            self.config_changed = true;
        }
        Ok(Registration {
            kind,
            id,
            outcome,
            nalu: stored,
        })
    }

    /// 是否已具备生成配置记录和解析切片所需的全部参数集
    pub fn ready(&self) -> bool {
        (!C::USES_VPS || !self.vps.is_empty()) && !self.sps.is_empty() && !self.pps.is_empty()
    }

    /// VPS 表
    pub fn vps_list(&self) -> &ParamRegistry<C::Vps> {
        &self.vps
    }

    /// SPS 表
    pub fn sps_list(&self) -> &ParamRegistry<C::Sps> {
        &self.sps
    }

    /// PPS 表
    pub fn pps_list(&self) -> &ParamRegistry<C::Pps> {
        &self.pps
    }

    /// 按 id 查找 VPS
    pub fn vps(&self, id: u32) -> Option<&C::Vps> {
        self.vps.get(id).map(|e| &e.params)
    }

    /// 按 id 查找 SPS
    pub fn sps(&self, id: u32) -> Option<&C::Sps> {
        self.sps.get(id).map(|e| &e.params)
    }

    /// 按 id 查找 PPS
    pub fn pps(&self, id: u32) -> Option<&C::Pps> {
        self.pps.get(id).map(|e| &e.params)
    }

    /// 保存一个头部 SEI NALU (写入配置记录)
    pub fn add_sei(&mut self, nalu: Bytes) {
        self.sei.push(nalu);
    }

    /// 已保存的 SEI NALU
    pub fn sei(&self) -> &[Bytes] {
        &self.sei
    }

    /// 参数集是否发生过变化
    pub fn config_changed(&self) -> bool {
        self.config_changed
    }

    /// 清除配置变化标记
    pub fn clear_config_changed(&mut self) {
        self.config_changed = false;
    }

    /// 生成配置记录, 需要 [`Self::ready`]
    pub fn pack(&self, nalu_size_length: usize) -> EsResult<Vec<u8>> {
        if !self.ready() {
            return Err(EsError::InvalidArgument(format!(
                "{}: 参数集不完整, 无法生成配置记录",
                C::NAME
            )));
        }
        C::pack_config(self, nalu_size_length)
    }
}
